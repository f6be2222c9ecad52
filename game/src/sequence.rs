use std::time::Duration;

use genius_engine::Countdown;
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::color::Color;

pub const INITIAL_SPEED_MS: u32 = 800;
pub const MIN_SPEED_MS: u32 = 400;
pub const SPEED_STEP_MS: u32 = 30;
/// Pause between two lit colors during playback.
pub const PLAYBACK_GAP: Duration = Duration::from_millis(150);
/// Pause before the first color of a playback.
pub const PLAYBACK_LEAD_IN: Duration = Duration::from_millis(100);
pub const DEFAULT_INACTIVITY: Duration = Duration::from_secs(5);
/// How long a lost round stays on screen before returning to idle.
pub const GAME_OVER_HOLD: Duration = Duration::from_secs(4);
/// Same, when the round set a new record.
pub const NEW_RECORD_HOLD: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    ShowingSequence,
    AwaitingInput,
    /// Round over; input is discarded until the hold runs out or the round
    /// is reset.
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameOverReason {
    WrongColor,
    Inactivity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverReport {
    pub score: u32,
    pub record: u32,
    pub level: u32,
    pub new_record: bool,
    pub reason: GameOverReason,
    #[serde(skip)]
    pub duration: Duration,
}

/// What happened during an engine call, oldest first. The session forwards
/// these to the event sink and the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    SequenceExtended {
        sequence: Vec<Color>,
        level: u32,
        score: u32,
    },
    Activated {
        color: Color,
        position: usize,
        total: usize,
    },
    Deactivated {
        color: Color,
    },
    AwaitingInput,
    Pressed {
        color: Color,
        correct: bool,
    },
    LevelComplete {
        score: u32,
        level: u32,
        speed_ms: u32,
    },
    GameOver(GameOverReport),
    /// The game-over hold ran out; the engine is idle again.
    ReturnedToIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("a game is already running")]
    AlreadyPlaying,
    #[error("gamepad configuration is in progress")]
    ConfigurationActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackStep {
    LeadIn,
    Hold(usize),
    Gap(usize),
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    step: PlaybackStep,
    timer: Countdown,
}

/// Read-only view of the round for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub phase: Phase,
    pub level: u32,
    pub score: u32,
    pub record: u32,
    pub speed_ms: u32,
    pub sequence: Vec<Color>,
    pub progress: usize,
    pub lit: Option<Color>,
    pub inactivity_progress_percent: u8,
}

/// The Simon round: grows the sequence by one color per level, plays it
/// back, then checks the player's input against it.
///
/// Time only moves through [`SequenceEngine::tick`]; playback waits and the
/// inactivity timeout are countdowns fed by it.
#[derive(Debug, Clone)]
pub struct SequenceEngine {
    phase: Phase,
    level: u32,
    score: u32,
    record: u32,
    speed_ms: u32,
    sequence: Vec<Color>,
    progress: usize,
    playback: Option<Playback>,
    lit: Option<Color>,
    inactivity_limit: Duration,
    inactivity: Countdown,
    game_over_hold: Countdown,
    round_elapsed: Duration,
    rng: Rng,
}

impl SequenceEngine {
    pub fn new(seed: u64, record: u32, inactivity_limit: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            level: 1,
            score: 0,
            record,
            speed_ms: INITIAL_SPEED_MS,
            sequence: Vec::new(),
            progress: 0,
            playback: None,
            lit: None,
            inactivity_limit,
            inactivity: Countdown::idle(),
            game_over_hold: Countdown::idle(),
            round_elapsed: Duration::ZERO,
            rng: Rng::new(seed),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn record(&self) -> u32 {
        self.record
    }

    pub fn speed_ms(&self) -> u32 {
        self.speed_ms
    }

    pub fn sequence(&self) -> &[Color] {
        &self.sequence
    }

    pub fn progress(&self) -> usize {
        self.progress
    }

    /// The color currently lit by playback.
    pub fn lit(&self) -> Option<Color> {
        self.lit
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.phase, Phase::ShowingSequence | Phase::AwaitingInput)
    }

    pub fn is_showing_sequence(&self) -> bool {
        self.phase == Phase::ShowingSequence
    }

    pub fn inactivity(&self) -> &Countdown {
        &self.inactivity
    }

    pub fn inactivity_limit(&self) -> Duration {
        self.inactivity_limit
    }

    /// Takes effect the next time the timer is armed.
    pub fn set_inactivity_limit(&mut self, limit: Duration) {
        self.inactivity_limit = limit;
    }

    /// Armed while the game-over screen is up.
    pub fn game_over_hold(&self) -> &Countdown {
        &self.game_over_hold
    }

    pub fn round_elapsed(&self) -> Duration {
        self.round_elapsed
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            phase: self.phase,
            level: self.level,
            score: self.score,
            record: self.record,
            speed_ms: self.speed_ms,
            sequence: self.sequence.clone(),
            progress: self.progress,
            lit: self.lit,
            inactivity_progress_percent: (self.inactivity.progress() * 100.0).round() as u8,
        }
    }

    pub fn start_game(&mut self) -> Result<Vec<EngineEvent>, StartError> {
        if self.is_playing() {
            return Err(StartError::AlreadyPlaying);
        }
        self.inactivity.disarm();
        self.game_over_hold.disarm();
        self.playback = None;
        self.lit = None;
        self.score = 0;
        self.level = 1;
        self.speed_ms = INITIAL_SPEED_MS;
        self.progress = 0;
        self.sequence.clear();
        self.round_elapsed = Duration::ZERO;
        info!("game started");

        let mut events = vec![self.generate_sequence()];
        self.show_sequence();
        events.extend(self.tick(Duration::ZERO));
        Ok(events)
    }

    /// Appends exactly one random color; earlier entries are untouched.
    pub fn generate_sequence(&mut self) -> EngineEvent {
        let color = Color::ALL[(self.rng.next_u32() % Color::ALL.len() as u32) as usize];
        self.sequence.push(color);
        debug!("level {}: sequence {:?}", self.level, self.sequence);
        EngineEvent::SequenceExtended {
            sequence: self.sequence.clone(),
            level: self.level,
            score: self.score,
        }
    }

    /// Starts playing the whole sequence back from the first color. Input is
    /// discarded until playback ends.
    pub fn show_sequence(&mut self) {
        self.inactivity.disarm();
        self.phase = Phase::ShowingSequence;
        self.lit = None;
        self.playback = Some(Playback {
            step: PlaybackStep::LeadIn,
            timer: Countdown::armed(PLAYBACK_LEAD_IN),
        });
    }

    /// Time left until playback ends, zero when not showing.
    pub fn playback_remaining(&self) -> Duration {
        let Some(playback) = self.playback else {
            return Duration::ZERO;
        };
        let n = self.sequence.len() as u32;
        let hold = Duration::from_millis(self.speed_ms as u64);
        let current = playback.timer.remaining();
        match playback.step {
            PlaybackStep::LeadIn => current + hold * n + PLAYBACK_GAP * n.saturating_sub(1),
            PlaybackStep::Hold(i) => {
                let rest = n.saturating_sub(i as u32 + 1);
                current + (hold + PLAYBACK_GAP) * rest
            }
            PlaybackStep::Gap(i) => {
                let holds = n.saturating_sub(i as u32 + 1);
                current + hold * holds + PLAYBACK_GAP * holds.saturating_sub(1)
            }
        }
    }

    pub fn handle_input(&mut self, color: Color) -> Vec<EngineEvent> {
        if self.phase != Phase::AwaitingInput {
            debug!("input {color} discarded in {:?}", self.phase);
            return Vec::new();
        }
        let Some(&expected) = self.sequence.get(self.progress) else {
            return Vec::new();
        };

        self.inactivity.disarm();
        let correct = color == expected;
        let mut events = vec![EngineEvent::Pressed { color, correct }];
        if !correct {
            debug!("expected {expected}, got {color}");
            events.push(self.game_over(GameOverReason::WrongColor));
            return events;
        }

        self.progress += 1;
        if self.progress == self.sequence.len() {
            self.level_complete(&mut events);
        } else {
            self.inactivity.arm(self.inactivity_limit);
        }
        events
    }

    pub fn tick(&mut self, dt: Duration) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let held_over = self.phase == Phase::GameOver;
        if self.is_playing() {
            self.round_elapsed = self.round_elapsed.saturating_add(dt);
        }

        let mut leftover = dt;
        if self.phase == Phase::ShowingSequence {
            leftover = self.advance_playback(dt, &mut events);
        }
        if self.phase == Phase::AwaitingInput && self.inactivity.tick(leftover) {
            info!("inactivity timeout");
            events.push(self.game_over(GameOverReason::Inactivity));
        }
        if held_over && self.game_over_hold.tick(dt) {
            self.reset_game();
            info!("back to idle");
            events.push(EngineEvent::ReturnedToIdle);
        }
        events
    }

    /// Back to a clean idle round. The record is kept.
    pub fn reset_game(&mut self) {
        self.phase = Phase::Idle;
        self.level = 1;
        self.score = 0;
        self.speed_ms = INITIAL_SPEED_MS;
        self.sequence.clear();
        self.progress = 0;
        self.playback = None;
        self.lit = None;
        self.inactivity.disarm();
        self.game_over_hold.disarm();
        self.round_elapsed = Duration::ZERO;
    }

    fn level_complete(&mut self, events: &mut Vec<EngineEvent>) {
        self.score += 1;
        self.level += 1;
        self.speed_ms = self
            .speed_ms
            .saturating_sub(SPEED_STEP_MS)
            .max(MIN_SPEED_MS);
        info!(
            "level complete: score {} level {} speed {}ms",
            self.score, self.level, self.speed_ms
        );
        events.push(EngineEvent::LevelComplete {
            score: self.score,
            level: self.level,
            speed_ms: self.speed_ms,
        });
        events.push(self.generate_sequence());
        self.show_sequence();
    }

    fn game_over(&mut self, reason: GameOverReason) -> EngineEvent {
        self.phase = Phase::GameOver;
        self.playback = None;
        self.lit = None;
        self.inactivity.disarm();

        let new_record = self.score > self.record;
        if new_record {
            self.record = self.score;
        }
        self.game_over_hold.arm(if new_record {
            NEW_RECORD_HOLD
        } else {
            GAME_OVER_HOLD
        });
        info!(
            "game over ({reason:?}): score {} record {}",
            self.score, self.record
        );
        EngineEvent::GameOver(GameOverReport {
            score: self.score,
            record: self.record,
            level: self.level.saturating_sub(1),
            new_record,
            reason,
            duration: self.round_elapsed,
        })
    }

    /// Runs playback forward by `dt`, possibly across several steps. Returns
    /// the time left over once playback has finished.
    fn advance_playback(&mut self, dt: Duration, events: &mut Vec<EngineEvent>) -> Duration {
        let mut remaining = dt;
        while let Some(mut playback) = self.playback.take() {
            let Some(overflow) = playback.timer.tick_overflow(remaining) else {
                self.playback = Some(playback);
                return Duration::ZERO;
            };
            remaining = overflow;

            let next = match playback.step {
                PlaybackStep::LeadIn => Some(0),
                PlaybackStep::Gap(i) => Some(i + 1),
                PlaybackStep::Hold(i) => {
                    if let Some(color) = self.lit.take() {
                        events.push(EngineEvent::Deactivated { color });
                    }
                    if i + 1 < self.sequence.len() {
                        playback.step = PlaybackStep::Gap(i);
                        playback.timer.arm(PLAYBACK_GAP);
                        self.playback = Some(playback);
                    }
                    None
                }
            };

            if let Some(position) = next {
                let Some(&color) = self.sequence.get(position) else {
                    break;
                };
                self.lit = Some(color);
                events.push(EngineEvent::Activated {
                    color,
                    position,
                    total: self.sequence.len(),
                });
                playback.step = PlaybackStep::Hold(position);
                playback.timer.arm(Duration::from_millis(self.speed_ms as u64));
                self.playback = Some(playback);
            }
        }

        self.phase = Phase::AwaitingInput;
        self.progress = 0;
        self.inactivity.arm(self.inactivity_limit);
        events.push(EngineEvent::AwaitingInput);
        remaining
    }
}

/// xorshift64*; reproducible from a seed, which keeps tests deterministic.
#[derive(Debug, Clone)]
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        let seed = if seed == 0 {
            0x9E37_79B9_7F4A_7C15
        } else {
            seed
        };
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_is_reproducible_per_seed() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn colors_are_spread_over_all_six() {
        let mut engine = SequenceEngine::new(7, 0, DEFAULT_INACTIVITY);
        for _ in 0..300 {
            engine.generate_sequence();
        }
        for color in Color::ALL {
            assert!(engine.sequence().contains(&color), "{color} never drawn");
        }
    }

    #[test]
    fn playback_lights_each_color_in_order() {
        let mut engine = SequenceEngine::new(3, 0, DEFAULT_INACTIVITY);
        engine.start_game().unwrap();
        engine.generate_sequence();
        engine.generate_sequence();
        engine.show_sequence();

        let expected = engine.sequence().to_vec();
        let mut lit = Vec::new();
        for _ in 0..1000 {
            for event in engine.tick(Duration::from_millis(10)) {
                if let EngineEvent::Activated {
                    color,
                    position,
                    total,
                } = event
                {
                    assert_eq!(position, lit.len());
                    assert_eq!(total, 3);
                    lit.push(color);
                }
            }
            if engine.phase() == Phase::AwaitingInput {
                break;
            }
        }
        assert_eq!(lit, expected);
        assert_eq!(engine.lit(), None);
    }

    #[test]
    fn playback_remaining_matches_actual_playback() {
        let mut engine = SequenceEngine::new(11, 0, DEFAULT_INACTIVITY);
        engine.start_game().unwrap();
        engine.generate_sequence();
        engine.show_sequence();
        // 100 lead-in + 2 * 800 hold + 150 gap
        assert_eq!(engine.playback_remaining(), Duration::from_millis(1850));

        engine.tick(Duration::from_millis(1000));
        assert_eq!(engine.playback_remaining(), Duration::from_millis(850));
        engine.tick(Duration::from_millis(849));
        assert_eq!(engine.phase(), Phase::ShowingSequence);
        engine.tick(Duration::from_millis(1));
        assert_eq!(engine.phase(), Phase::AwaitingInput);
    }
}
