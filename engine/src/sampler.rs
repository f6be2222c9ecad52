use std::{cell::RefCell, rc::Rc};

use log::info;

/// Button-pressed state of one gamepad at one poll tick.
///
/// The length is whatever the device reports and may change between polls
/// when the pad is reconnected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GamepadSnapshot {
    pressed: Vec<bool>,
}

impl GamepadSnapshot {
    pub fn new(pressed: Vec<bool>) -> Self {
        Self { pressed }
    }

    /// All buttons released.
    pub fn released(len: usize) -> Self {
        Self {
            pressed: vec![false; len],
        }
    }

    /// A snapshot of `len` buttons where only `held` are pressed. Indices past
    /// `len` are ignored.
    pub fn with_pressed(len: usize, held: &[usize]) -> Self {
        let mut snapshot = Self::released(len);
        for &index in held {
            if let Some(slot) = snapshot.pressed.get_mut(index) {
                *slot = true;
            }
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.pressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }

    /// Indices the device does not report count as released.
    pub fn is_pressed(&self, index: usize) -> bool {
        self.pressed.get(index).copied().unwrap_or(false)
    }

    pub fn buttons(&self) -> &[bool] {
        &self.pressed
    }
}

/// Platform seam: reads the first connected gamepad.
pub trait GamepadSource {
    /// `None` when no gamepad is connected this tick.
    fn poll(&mut self) -> Option<GamepadSnapshot>;
}

impl<S: GamepadSource + ?Sized> GamepadSource for Box<S> {
    fn poll(&mut self) -> Option<GamepadSnapshot> {
        (**self).poll()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoGamepad;

impl GamepadSource for NoGamepad {
    fn poll(&mut self) -> Option<GamepadSnapshot> {
        None
    }
}

/// A gamepad driven by hand. Clones share the same pad, so a test (or a
/// keyboard bridge) can keep one handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualGamepad {
    state: Rc<RefCell<Option<GamepadSnapshot>>>,
}

impl ManualGamepad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(buttons: usize) -> Self {
        let pad = Self::new();
        pad.connect(buttons);
        pad
    }

    pub fn connect(&self, buttons: usize) {
        *self.state.borrow_mut() = Some(GamepadSnapshot::released(buttons));
    }

    pub fn disconnect(&self) {
        *self.state.borrow_mut() = None;
    }

    pub fn set(&self, snapshot: GamepadSnapshot) {
        *self.state.borrow_mut() = Some(snapshot);
    }

    pub fn press(&self, index: usize) {
        self.set_button(index, true);
    }

    pub fn release(&self, index: usize) {
        self.set_button(index, false);
    }

    pub fn release_all(&self) {
        if let Some(snapshot) = self.state.borrow_mut().as_mut() {
            snapshot.pressed.iter_mut().for_each(|b| *b = false);
        }
    }

    fn set_button(&self, index: usize, pressed: bool) {
        let mut state = self.state.borrow_mut();
        let Some(snapshot) = state.as_mut() else {
            return;
        };
        if index >= snapshot.pressed.len() {
            snapshot.pressed.resize(index + 1, false);
        }
        snapshot.pressed[index] = pressed;
    }
}

impl GamepadSource for ManualGamepad {
    fn poll(&mut self) -> Option<GamepadSnapshot> {
        self.state.borrow().clone()
    }
}

/// Wraps a [`GamepadSource`] and tracks connect/disconnect transitions.
#[derive(Debug)]
pub struct InputSampler<S> {
    source: S,
    connected: bool,
}

impl<S: GamepadSource> InputSampler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            connected: false,
        }
    }

    pub fn sample(&mut self) -> Option<GamepadSnapshot> {
        let snapshot = self.source.poll();
        match (&snapshot, self.connected) {
            (Some(s), false) => {
                info!("gamepad connected ({} buttons)", s.len());
                self.connected = true;
            }
            (None, true) => {
                info!("gamepad disconnected");
                self.connected = false;
            }
            _ => {}
        }
        snapshot
    }

    /// Connection state as of the last sample.
    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_treats_missing_indices_as_released() {
        let s = GamepadSnapshot::with_pressed(4, &[1, 9]);
        assert!(s.is_pressed(1));
        assert!(!s.is_pressed(0));
        assert!(!s.is_pressed(9));
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn sampler_tracks_connection_changes() {
        let pad = ManualGamepad::new();
        let mut sampler = InputSampler::new(pad.clone());
        assert!(sampler.sample().is_none());
        assert!(!sampler.connected());

        pad.connect(16);
        assert_eq!(sampler.sample().map(|s| s.len()), Some(16));
        assert!(sampler.connected());

        pad.disconnect();
        assert!(sampler.sample().is_none());
        assert!(!sampler.connected());
    }

    #[test]
    fn manual_pad_grows_when_pressing_past_its_width() {
        let pad = ManualGamepad::connected(2);
        pad.press(5);
        let mut source = pad.clone();
        let snapshot = source.poll().expect("connected");
        assert_eq!(snapshot.len(), 6);
        assert!(snapshot.is_pressed(5));
    }

    #[test]
    fn pressing_a_disconnected_pad_is_a_no_op() {
        let mut pad = ManualGamepad::new();
        pad.press(0);
        assert!(pad.poll().is_none());
    }
}
