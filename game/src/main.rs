use std::{
    io::{self, BufRead},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use genius_engine::GamepadSource;
use log::{info, warn};

use genius::color::Color;
use genius::sequence::EngineEvent;
use genius::session::Session;
use genius::sink::{EventSink, HttpSink, LogSink};
use genius::storage::FileStore;

const FRAME: Duration = Duration::from_millis(16);

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

#[derive(Debug, Default, Clone)]
struct Cli {
    help: bool,
    no_sink: bool,
    seed: Option<u64>,
}

fn print_help() {
    println!(
        r#"Genius

Usage:
  genius [--seed N] [--no-sink]

Flags:
  --seed N     Seed for the color sequence (default: GENIUS_SEED or the clock).
  --no-sink    Log outbound events instead of posting them.
  --help, -h   Show this help.

Commands (type and press Enter):
  1..6         Press a color (any key starts a game when idle)
  s            Start a game
  r            Reset the current game
  c            Sequential gamepad configuration
  m<1..6>      Remap one color, e.g. m3
  w            Save the single-slot mapping
  x            Cancel configuration
  q            Quit

Environment:
  GENIUS_DATA_DIR   Where record, config, mapping and history are stored.
  RUST_LOG          Log filter (default: info).
"#
    );
}

fn parse_cli() -> io::Result<Cli> {
    let mut cli = Cli::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => cli.help = true,
            "--no-sink" => cli.no_sink = true,
            "--seed" => {
                let value = args.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "--seed needs a value")
                })?;
                let seed = value.parse::<u64>().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("bad seed: {value}"))
                })?;
                cli.seed = Some(seed);
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unknown argument: {other}"),
                ));
            }
        }
    }
    Ok(cli)
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[cfg(feature = "gamepad")]
fn gamepad() -> Box<dyn GamepadSource> {
    match genius_engine::gilrs_source::GilrsSource::new() {
        Ok(source) => Box::new(source),
        Err(err) => {
            warn!("gamepad support unavailable: {err}");
            Box::new(genius_engine::NoGamepad)
        }
    }
}

#[cfg(not(feature = "gamepad"))]
fn gamepad() -> Box<dyn GamepadSource> {
    Box::new(genius_engine::NoGamepad)
}

fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Returns false when the driver should quit.
fn run_command(session: &mut Session<Box<dyn GamepadSource>, FileStore>, line: &str) -> bool {
    let line = line.trim();
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (None, _) => {}
        (Some('q'), None) => return false,
        (Some('s'), None) => {
            if let Err(err) = session.start_game() {
                println!("cannot start: {err}");
            }
        }
        (Some('r'), None) => session.reset_game(),
        (Some('c'), None) => session.start_sequential_config(),
        (Some('x'), None) => session.cancel_config(),
        (Some('w'), None) => {
            if let Err(err) = session.save_slot_mapping() {
                println!("not saved: {err}");
            }
        }
        (Some('m'), Some(key)) => match Color::from_key(key) {
            Some(color) => session.start_slot_mapping(color),
            None => println!("pick a color 1..6, e.g. m3"),
        },
        (Some(key), None) => session.press_key(key),
        _ => println!("unknown command {line:?} (try --help)"),
    }
    true
}

fn describe(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::SequenceExtended { level, .. } => Some(format!("level {level}")),
        EngineEvent::Activated {
            color,
            position,
            total,
        } => Some(format!("  [{}/{}] {color}", position + 1, total)),
        EngineEvent::AwaitingInput => Some("your turn".to_string()),
        EngineEvent::Pressed { color, correct } => {
            Some(format!("  {color} {}", if *correct { "ok" } else { "WRONG" }))
        }
        EngineEvent::LevelComplete { score, speed_ms, .. } => {
            Some(format!("score {score}, speed {speed_ms}ms"))
        }
        EngineEvent::GameOver(report) => Some(format!(
            "game over ({:?}): score {} record {}",
            report.reason, report.score, report.record
        )),
        EngineEvent::ReturnedToIdle => Some("press any key to play".to_string()),
        EngineEvent::Deactivated { .. } => None,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = parse_cli()?;
    if cli.help {
        print_help();
        return Ok(());
    }

    let store = FileStore::from_env();
    info!("data directory: {}", store.dir().display());
    let seed = cli
        .seed
        .or_else(|| env_u64("GENIUS_SEED"))
        .unwrap_or_else(clock_seed);

    let mut session = Session::new(gamepad(), store, Box::new(LogSink), seed);
    if !cli.no_sink {
        let config = session.config().clone();
        let sink: Box<dyn EventSink> = match HttpSink::start(&config.sink_host, config.sink_port) {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                warn!("event sink unavailable, logging events instead: {err}");
                Box::new(LogSink)
            }
        };
        session.set_sink(sink);
    }

    println!("Genius ready. Press any key + Enter to start, q to quit.");
    let lines = stdin_lines();
    let mut last = Instant::now();
    'run: loop {
        loop {
            match lines.try_recv() {
                Ok(line) => {
                    if !run_command(&mut session, &line) {
                        break 'run;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'run,
            }
        }

        let now = Instant::now();
        session.tick(now - last);
        last = now;

        for note in session.drain_notifications() {
            println!("[{}] {}", note.kind, note.message);
        }
        for event in session.drain_events() {
            if let Some(line) = describe(&event) {
                println!("{line}");
            }
        }

        thread::sleep(FRAME);
    }

    Ok(())
}
