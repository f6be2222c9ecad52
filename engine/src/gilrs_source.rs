//! Gamepad backend on top of `gilrs`.
//!
//! gilrs exposes named buttons rather than raw positions, so the snapshot is
//! laid out in the "standard gamepad" order browsers use (South = 0 ...
//! Start = 9 ... Mode = 16). Saved mappings therefore carry over between the
//! browser build and this one.

use gilrs::{Button, Gilrs};

use crate::sampler::{GamepadSnapshot, GamepadSource};

const STANDARD_LAYOUT: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

pub struct GilrsSource {
    gilrs: Gilrs,
}

impl GilrsSource {
    pub fn new() -> Result<Self, gilrs::Error> {
        Ok(Self {
            gilrs: Gilrs::new()?,
        })
    }
}

impl GamepadSource for GilrsSource {
    fn poll(&mut self) -> Option<GamepadSnapshot> {
        // Pump the event queue so gilrs refreshes its cached pad state.
        while self.gilrs.next_event().is_some() {}

        let (_, pad) = self.gilrs.gamepads().find(|(_, pad)| pad.is_connected())?;
        let pressed = STANDARD_LAYOUT
            .iter()
            .map(|&button| pad.is_pressed(button))
            .collect();
        Some(GamepadSnapshot::new(pressed))
    }
}
