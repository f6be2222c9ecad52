use log::debug;

use crate::sampler::GamepadSnapshot;

/// A released-to-pressed transition of one physical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonDown {
    pub index: usize,
}

impl ButtonDown {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

/// Last-known pressed state per physical button index.
///
/// Grows to the widest snapshot seen and never shrinks while in use; indices a
/// narrower snapshot does not report are treated as released.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonLatch {
    held: Vec<bool>,
}

impl ButtonLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn is_held(&self, index: usize) -> bool {
        self.held.get(index).copied().unwrap_or(false)
    }

    /// Copies the snapshot into the latch without reporting anything.
    pub fn absorb(&mut self, snapshot: &GamepadSnapshot) {
        self.grow_to(snapshot.len());
        for (index, held) in self.held.iter_mut().enumerate() {
            *held = snapshot.is_pressed(index);
        }
    }

    /// Every transition in the snapshot, ascending, all of them latched.
    pub fn detect_all(&mut self, snapshot: &GamepadSnapshot) -> Vec<ButtonDown> {
        self.grow_to(snapshot.len());
        let mut downs = Vec::new();
        for (index, held) in self.held.iter_mut().enumerate() {
            let pressed = snapshot.is_pressed(index);
            if pressed && !*held {
                downs.push(ButtonDown::new(index));
            }
            *held = pressed;
        }
        downs
    }

    /// The lowest-index transition only.
    ///
    /// Releases are applied everywhere. Any further button that went down in
    /// the same snapshot is left unlatched so it is reported on a later call
    /// if it is still held.
    pub fn next_press(&mut self, snapshot: &GamepadSnapshot) -> Option<ButtonDown> {
        self.grow_to(snapshot.len());
        let mut first = None;
        for (index, held) in self.held.iter_mut().enumerate() {
            let pressed = snapshot.is_pressed(index);
            if !pressed {
                *held = false;
            } else if !*held {
                if first.is_none() {
                    *held = true;
                    first = Some(ButtonDown::new(index));
                } else {
                    debug!("button {index} deferred to a later tick");
                }
            }
        }
        first
    }

    fn grow_to(&mut self, len: usize) {
        if len > self.held.len() {
            self.held.resize(len, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_button_reports_once() {
        let mut latch = ButtonLatch::new();
        let held = GamepadSnapshot::with_pressed(4, &[2]);
        assert_eq!(latch.next_press(&held), Some(ButtonDown::new(2)));
        assert_eq!(latch.next_press(&held), None);
        assert_eq!(latch.next_press(&held), None);

        latch.next_press(&GamepadSnapshot::released(4));
        assert_eq!(latch.next_press(&held), Some(ButtonDown::new(2)));
    }

    #[test]
    fn simultaneous_presses_come_out_lowest_first_one_per_call() {
        let mut latch = ButtonLatch::new();
        let both = GamepadSnapshot::with_pressed(8, &[5, 1]);
        assert_eq!(latch.next_press(&both), Some(ButtonDown::new(1)));
        assert_eq!(latch.next_press(&both), Some(ButtonDown::new(5)));
        assert_eq!(latch.next_press(&both), None);
    }

    #[test]
    fn shrinking_snapshot_counts_missing_buttons_as_released() {
        let mut latch = ButtonLatch::new();
        latch.next_press(&GamepadSnapshot::with_pressed(10, &[8]));
        assert!(latch.is_held(8));

        assert_eq!(latch.next_press(&GamepadSnapshot::released(4)), None);
        assert_eq!(latch.len(), 10);
        assert!(!latch.is_held(8));

        assert_eq!(
            latch.next_press(&GamepadSnapshot::with_pressed(10, &[8])),
            Some(ButtonDown::new(8))
        );
    }

    #[test]
    fn detect_all_reports_every_transition() {
        let mut latch = ButtonLatch::new();
        let downs = latch.detect_all(&GamepadSnapshot::with_pressed(6, &[0, 3, 5]));
        assert_eq!(
            downs,
            vec![ButtonDown::new(0), ButtonDown::new(3), ButtonDown::new(5)]
        );
        assert!(latch
            .detect_all(&GamepadSnapshot::with_pressed(6, &[0, 3, 5]))
            .is_empty());
    }

    #[test]
    fn absorb_latches_without_reporting() {
        let mut latch = ButtonLatch::new();
        let held = GamepadSnapshot::with_pressed(4, &[3]);
        latch.absorb(&held);
        assert_eq!(latch.next_press(&held), None);
    }
}
