use std::time::Duration;

use genius_engine::{ButtonDown, GamepadSource, InputSampler, PollLoop};
use log::{debug, info, warn};
use serde::Serialize;

use crate::color::Color;
use crate::history::{DEFAULT_PLAYER, GameHistory, RoundSummary};
use crate::mapping::{ColorMapping, MappingError, MappingStore};
use crate::notify::{Notification, Notifications};
use crate::sequence::{EngineEvent, GameOverReport, Phase, SequenceEngine, StartError};
use crate::settings::{GameConfig, SettingsStore};
use crate::sink::{EventSink, SinkEvent, now_millis};
use crate::storage::{KeyValueStore, StorageError, load_record, save_record};
use crate::wizard::{SequentialWizard, SingleSlotMapper, SlotOutcome, WizardOutcome, WizardState};

/// Which consumer currently receives gamepad button-downs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Play,
    SequentialConfig,
    SlotConfig,
}

/// Everything a running game needs, owned in one place.
///
/// Gameplay and configuration are mutually exclusive: exactly one of the two
/// poll loops runs at a time, each with its own latch. Time only advances
/// through [`Session::tick`].
pub struct Session<G, S> {
    sampler: InputSampler<G>,
    gameplay_poll: PollLoop,
    config_poll: PollLoop,
    store: S,
    mappings: MappingStore<S>,
    settings: SettingsStore<S>,
    config: GameConfig,
    history: GameHistory<S>,
    wizard: SequentialWizard,
    slot: SingleSlotMapper,
    engine: SequenceEngine,
    sink: Box<dyn EventSink>,
    notes: Notifications,
    events: Vec<EngineEvent>,
    player: String,
}

impl<G, S> Session<G, S>
where
    G: GamepadSource,
    S: KeyValueStore + Clone,
{
    pub fn new(source: G, store: S, sink: Box<dyn EventSink>, seed: u64) -> Self {
        let settings = SettingsStore::new(store.clone());
        let config = settings.load();
        let mappings = MappingStore::open(store.clone());
        let history = GameHistory::open(store.clone());
        let record = load_record(&store);
        let slot = SingleSlotMapper::new(mappings.current().clone());
        let engine = SequenceEngine::new(seed, record, config.inactivity());

        let mut gameplay_poll = PollLoop::gameplay();
        gameplay_poll.start();

        info!(
            "session ready: record {record}, {} colors mapped, {} rounds in history",
            mappings.current().len(),
            history.len()
        );

        Self {
            sampler: InputSampler::new(source),
            gameplay_poll,
            config_poll: PollLoop::configuration(),
            store,
            mappings,
            settings,
            config,
            history,
            wizard: SequentialWizard::new(),
            slot,
            engine,
            sink,
            notes: Notifications::new(),
            events: Vec::new(),
            player: DEFAULT_PLAYER.to_string(),
        }
    }

    pub fn mode(&self) -> Mode {
        if self.wizard.is_active() {
            Mode::SequentialConfig
        } else if self.slot.is_active() {
            Mode::SlotConfig
        } else {
            Mode::Play
        }
    }

    pub fn is_configuring(&self) -> bool {
        self.mode() != Mode::Play
    }

    pub fn engine(&self) -> &SequenceEngine {
        &self.engine
    }

    pub fn mapping(&self) -> &ColorMapping {
        self.mappings.current()
    }

    pub fn wizard(&self) -> &SequentialWizard {
        &self.wizard
    }

    pub fn slot(&self) -> &SingleSlotMapper {
        &self.slot
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn history(&self) -> &GameHistory<S> {
        &self.history
    }

    pub fn gameplay_poll(&self) -> &PollLoop {
        &self.gameplay_poll
    }

    pub fn config_poll(&self) -> &PollLoop {
        &self.config_poll
    }

    pub fn gamepad_connected(&self) -> bool {
        self.sampler.connected()
    }

    pub fn gamepad_mut(&mut self) -> &mut G {
        self.sampler.source_mut()
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn set_player(&mut self, player: impl Into<String>) {
        self.player = player.into();
    }

    pub fn set_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = sink;
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notes.drain()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn tick(&mut self, dt: Duration) {
        if self.slot.tick(dt, &mut self.notes) {
            self.leave_configuration();
        }

        for _ in 0..self.config_poll.due_ticks(dt) {
            if let Some(down) = self.config_poll.poll(&mut self.sampler) {
                self.handle_config_press(down);
            }
        }

        for _ in 0..self.gameplay_poll.due_ticks(dt) {
            if let Some(down) = self.gameplay_poll.poll(&mut self.sampler) {
                self.handle_gameplay_press(down);
            }
        }

        let events = self.engine.tick(dt);
        self.dispatch(events);
    }

    /// Keyboard input: digits 1..6 are colors. Any key starts a game while
    /// idle; keys are dropped while the game-over screen is up.
    pub fn press_key(&mut self, key: char) {
        if self.is_configuring() {
            debug!("key {key:?} ignored during configuration");
            return;
        }
        match self.engine.phase() {
            Phase::Idle => {
                let _ = self.start_game();
                return;
            }
            Phase::GameOver => {
                debug!("key {key:?} ignored after game over");
                return;
            }
            Phase::ShowingSequence | Phase::AwaitingInput => {}
        }
        match Color::from_key(key) {
            Some(color) => self.input(color),
            None => debug!("key {key:?} is not a color"),
        }
    }

    /// A pointer click on a color pad.
    pub fn click(&mut self, color: Color) {
        if self.is_configuring() || !self.engine.is_playing() {
            return;
        }
        self.input(color);
    }

    pub fn start_game(&mut self) -> Result<(), StartError> {
        if self.is_configuring() {
            self.notes
                .warning("Finish the gamepad configuration before starting a game");
            return Err(StartError::ConfigurationActive);
        }
        self.engine.set_inactivity_limit(self.config.inactivity());
        let events = self.engine.start_game()?;
        self.dispatch(events);
        Ok(())
    }

    pub fn reset_game(&mut self) {
        self.engine.reset_game();
        info!("game reset");
    }

    pub fn start_sequential_config(&mut self) {
        self.enter_configuration();
        self.slot.cancel();
        self.wizard.start(&mut self.notes);
    }

    pub fn start_slot_mapping(&mut self, color: Color) {
        self.enter_configuration();
        if self.wizard.is_active() {
            self.wizard.cancel(&mut self.notes);
        }
        self.slot.start(color, &mut self.notes);
    }

    /// Leaves any configuration mode. Unsaved single-slot edits are dropped.
    pub fn cancel_config(&mut self) {
        self.wizard.cancel(&mut self.notes);
        self.slot.cancel();
        self.slot.set_working(self.mappings.current().clone());
        self.leave_configuration();
    }

    pub fn save_slot_mapping(&mut self) -> Result<(), MappingError> {
        self.slot.save(&mut self.mappings, &mut self.notes)
    }

    pub fn reset_mapping(&mut self) -> Result<(), MappingError> {
        let mapping = self.mappings.reset()?.clone();
        self.slot.set_working(mapping);
        self.notes.success("Gamepad mapping restored to defaults");
        Ok(())
    }

    pub fn clear_mapping(&mut self) -> Result<(), MappingError> {
        self.mappings.clear()?;
        self.slot.set_working(self.mappings.current().clone());
        self.notes.info("Saved gamepad mapping removed");
        Ok(())
    }

    pub fn update_config(&mut self, config: GameConfig) -> Result<(), StorageError> {
        let config = config.sanitized();
        self.settings.save(&config)?;
        self.apply_config(config);
        self.notes.success("Settings saved");
        Ok(())
    }

    pub fn reset_config(&mut self) -> Result<(), StorageError> {
        let config = self.settings.reset()?;
        self.apply_config(config);
        self.notes.info("Settings restored to defaults");
        Ok(())
    }

    fn apply_config(&mut self, config: GameConfig) {
        self.engine.set_inactivity_limit(config.inactivity());
        let moved = config.sink_host != self.config.sink_host
            || config.sink_port != self.config.sink_port;
        if moved {
            self.sink.retarget(&config.sink_host, config.sink_port);
        }
        self.config = config;
    }

    pub fn clear_history(&mut self) -> Result<(), StorageError> {
        self.history.clear()?;
        self.notes.info("Game history cleared");
        Ok(())
    }

    fn enter_configuration(&mut self) {
        if self.engine.is_playing() {
            self.engine.reset_game();
            self.notes.warning("Game stopped for gamepad configuration");
        }
        self.gameplay_poll.stop();
        self.config_poll.start();
        info!("configuration mode");
    }

    fn leave_configuration(&mut self) {
        if self.is_configuring() {
            return;
        }
        if self.config_poll.is_running() {
            self.config_poll.stop();
            self.gameplay_poll.start_primed();
            info!("gameplay mode");
        }
    }

    fn handle_config_press(&mut self, down: ButtonDown) {
        if self.wizard.is_active() {
            let outcome = self
                .wizard
                .handle_press(down, &mut self.mappings, &mut self.notes);
            if let WizardOutcome::Mapped { .. } = outcome {
                if self.wizard.state() == WizardState::Complete {
                    self.slot.set_working(self.mappings.current().clone());
                    self.leave_configuration();
                }
            }
        } else if self.slot.is_active() {
            if let SlotOutcome::Mapped { .. } = self.slot.handle_press(down, &mut self.notes) {
                self.leave_configuration();
            }
        } else {
            debug!("configuration poll had no consumer for button {}", down.index);
        }
    }

    fn handle_gameplay_press(&mut self, down: ButtonDown) {
        match self.engine.phase() {
            Phase::Idle => {
                debug!("gamepad button {} starts a game", down.index);
                let _ = self.start_game();
                return;
            }
            Phase::GameOver => {
                debug!("gamepad button {} ignored after game over", down.index);
                return;
            }
            Phase::ShowingSequence | Phase::AwaitingInput => {}
        }
        match self.mappings.resolve(down.index) {
            Some(color) => self.input(color),
            None => debug!("gamepad button {} is not mapped", down.index),
        }
    }

    fn input(&mut self, color: Color) {
        let events = self.engine.handle_input(color);
        self.dispatch(events);
    }

    fn dispatch(&mut self, events: Vec<EngineEvent>) {
        for event in events {
            match &event {
                EngineEvent::SequenceExtended {
                    sequence,
                    level,
                    score,
                } => self.sink.emit(SinkEvent::SequenceStart {
                    sequence: sequence.clone(),
                    level: *level,
                    score: *score,
                }),
                EngineEvent::Activated {
                    color,
                    position,
                    total,
                } => self.sink.emit(SinkEvent::ButtonActivation {
                    color: *color,
                    position: *position,
                    total: *total,
                }),
                EngineEvent::Pressed { color, correct } => {
                    self.sink.emit(SinkEvent::ButtonPress {
                        color: *color,
                        correct: *correct,
                    })
                }
                EngineEvent::GameOver(report) => self.finish_round(report),
                EngineEvent::Deactivated { .. }
                | EngineEvent::AwaitingInput
                | EngineEvent::LevelComplete { .. }
                | EngineEvent::ReturnedToIdle => {}
            }
            self.events.push(event);
        }
    }

    fn finish_round(&mut self, report: &GameOverReport) {
        if report.new_record {
            if let Err(err) = save_record(&self.store, report.record) {
                warn!("could not save record {}: {err}", report.record);
            }
            self.notes
                .success(format!("New record: {} points!", report.record));
        } else {
            self.notes.info(format!(
                "Game over! Score: {} (record {})",
                report.score, report.record
            ));
        }

        let now = now_millis();
        let summary = RoundSummary {
            id: now,
            timestamp: now,
            score: report.score,
            level: report.level,
            duration: report.duration.as_secs(),
            is_new_record: report.new_record,
            player: self.player.clone(),
        };
        if let Err(err) = self.history.record(summary) {
            warn!("could not save game history: {err}");
        }

        self.sink.emit(SinkEvent::GameOver {
            final_score: report.score,
            new_record: report.new_record,
        });
    }
}
