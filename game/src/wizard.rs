use std::time::Duration;

use genius_engine::{ButtonDown, Countdown};
use log::{debug, info};

use crate::color::Color;
use crate::mapping::{ColorMapping, MappingError, MappingStore};
use crate::notify::Notifications;
use crate::storage::KeyValueStore;

/// Colors are bound in this order during a sequential pass.
pub const SEQUENTIAL_ORDER: [Color; 6] = Color::ALL;

/// How long a single-slot remap waits for a button.
pub const SLOT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardState {
    #[default]
    Idle,
    /// Waiting for the button of `SEQUENTIAL_ORDER[step]`.
    AwaitingButton(usize),
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome {
    /// Not awaiting a button; the press was dropped.
    Ignored,
    Rejected { button: usize, owner: Color },
    Mapped {
        color: Color,
        button: usize,
        next: Option<Color>,
    },
}

/// Guided pass that binds all six colors in order, one press each.
///
/// The working mapping is only persisted once all six are bound; cancelling
/// drops it.
#[derive(Debug, Clone, Default)]
pub struct SequentialWizard {
    state: WizardState,
    mapping: ColorMapping,
}

impl SequentialWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, WizardState::AwaitingButton(_))
    }

    pub fn current_step(&self) -> usize {
        match self.state {
            WizardState::Idle => 0,
            WizardState::AwaitingButton(step) => step,
            WizardState::Complete => SEQUENTIAL_ORDER.len(),
        }
    }

    /// The color whose button is expected next.
    pub fn awaiting(&self) -> Option<Color> {
        match self.state {
            WizardState::AwaitingButton(step) => SEQUENTIAL_ORDER.get(step).copied(),
            _ => None,
        }
    }

    /// Bindings confirmed so far in this pass.
    pub fn mapping(&self) -> &ColorMapping {
        &self.mapping
    }

    pub fn start(&mut self, notes: &mut Notifications) {
        self.mapping.clear();
        self.state = WizardState::AwaitingButton(0);
        notes.success("Sequential configuration started");
        let order = SEQUENTIAL_ORDER
            .iter()
            .map(|c| c.name().to_uppercase())
            .collect::<Vec<_>>()
            .join(" -> ");
        notes.info(format!("Press the gamepad buttons in order: {order}"));
    }

    pub fn handle_press<S: KeyValueStore>(
        &mut self,
        press: ButtonDown,
        store: &mut MappingStore<S>,
        notes: &mut Notifications,
    ) -> WizardOutcome {
        let WizardState::AwaitingButton(step) = self.state else {
            debug!("wizard idle, dropping button {}", press.index);
            return WizardOutcome::Ignored;
        };
        let color = SEQUENTIAL_ORDER[step];

        if let Err(MappingError::ButtonInUse { button, owner }) =
            self.mapping.bind(color, press.index)
        {
            notes.error(format!(
                "Button {button} is already mapped! Use another button."
            ));
            return WizardOutcome::Rejected { button, owner };
        }

        let step = step + 1;
        notes.success(format!("{color} mapped to gamepad button {}", press.index));
        info!(
            "{color} ({}) -> gamepad button {} (step {step}/{})",
            color.id(),
            press.index,
            SEQUENTIAL_ORDER.len()
        );

        let next = SEQUENTIAL_ORDER.get(step).copied();
        match next {
            Some(next_color) => {
                self.state = WizardState::AwaitingButton(step);
                notes.info(format!("Next: {}", next_color.name().to_uppercase()));
            }
            None => {
                self.state = WizardState::Complete;
                notes.success("Configuration complete! All buttons mapped.");
                if let Err(err) = store.save(self.mapping.clone()) {
                    notes.error(format!("Could not save the gamepad mapping: {err}"));
                }
            }
        }

        WizardOutcome::Mapped {
            color,
            button: press.index,
            next,
        }
    }

    /// Abandons the pass. Returns whether one was in progress.
    pub fn cancel(&mut self, notes: &mut Notifications) -> bool {
        let was_active = self.is_active();
        self.state = WizardState::Idle;
        self.mapping.clear();
        if was_active {
            notes.warning("Gamepad configuration cancelled");
        }
        was_active
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Ignored,
    Rejected { button: usize, owner: Color },
    Mapped { color: Color, button: usize },
}

/// Click-to-remap: binds one chosen color at a time into a working copy of
/// the mapping. The copy is persisted only by an explicit [`save`] once all
/// six colors are bound.
///
/// [`save`]: SingleSlotMapper::save
#[derive(Debug, Clone)]
pub struct SingleSlotMapper {
    target: Option<Color>,
    working: ColorMapping,
    timeout: Countdown,
}

impl SingleSlotMapper {
    pub fn new(working: ColorMapping) -> Self {
        Self {
            target: None,
            working,
            timeout: Countdown::idle(),
        }
    }

    pub fn target(&self) -> Option<Color> {
        self.target
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    pub fn working(&self) -> &ColorMapping {
        &self.working
    }

    pub fn timeout(&self) -> &Countdown {
        &self.timeout
    }

    /// Replaces the working copy, e.g. after the saved mapping was reset.
    pub fn set_working(&mut self, mapping: ColorMapping) {
        self.working = mapping;
    }

    /// Targets `color`. A pending slot is replaced.
    pub fn start(&mut self, color: Color, notes: &mut Notifications) {
        if self.target.is_some() {
            self.stop();
        }
        self.target = Some(color);
        self.timeout.arm(SLOT_TIMEOUT);
        notes.info(format!("Mapping {color}... press a button on your gamepad"));
    }

    pub fn handle_press(&mut self, press: ButtonDown, notes: &mut Notifications) -> SlotOutcome {
        let Some(color) = self.target else {
            return SlotOutcome::Ignored;
        };
        if let Err(MappingError::ButtonInUse { button, owner }) =
            self.working.bind(color, press.index)
        {
            notes.error(format!(
                "Button {button} is already mapped to {owner}! Use another button."
            ));
            return SlotOutcome::Rejected { button, owner };
        }
        self.stop();
        notes.success(format!("{color} mapped to gamepad button {}", press.index));
        if self.working.is_complete() {
            notes.success("All buttons are mapped. You can test and save.");
        }
        SlotOutcome::Mapped {
            color,
            button: press.index,
        }
    }

    /// Advances the timeout. Returns true if the pending slot expired.
    pub fn tick(&mut self, dt: Duration, notes: &mut Notifications) -> bool {
        if self.target.is_none() || !self.timeout.tick(dt) {
            return false;
        }
        self.stop();
        notes.warning("Time is up. Pick the color again to retry.");
        true
    }

    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        self.stop();
        was_active
    }

    fn stop(&mut self) {
        self.target = None;
        self.timeout.disarm();
    }

    pub fn save<S: KeyValueStore>(
        &self,
        store: &mut MappingStore<S>,
        notes: &mut Notifications,
    ) -> Result<(), MappingError> {
        if !self.working.is_complete() {
            notes.error("Map all 6 buttons before saving!");
            return Err(MappingError::Incomplete {
                bound: self.working.len(),
            });
        }
        store.save(self.working.clone())?;
        notes.success("Configuration saved.");
        Ok(())
    }
}
