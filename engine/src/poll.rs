use std::time::Duration;

use log::debug;

use crate::edge::{ButtonDown, ButtonLatch};
use crate::sampler::{GamepadSource, InputSampler};

/// ~60 polls per second for live play.
pub const GAMEPLAY_POLL_INTERVAL: Duration = Duration::from_millis(16);
/// ~20 polls per second while remapping buttons.
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_millis(50);

// After a long stall we do not replay hundreds of identical samples.
const MAX_CATCH_UP_TICKS: u32 = 8;

/// A recurring, stoppable gamepad poll with its own cadence and latch.
///
/// Each running loop owns an independent [`ButtonLatch`], so two loops never
/// share edge state. Every (re)start clears the latch.
#[derive(Debug, Clone)]
pub struct PollLoop {
    name: &'static str,
    interval: Duration,
    elapsed: Duration,
    running: bool,
    // Absorb the first sample after a primed start instead of reporting it.
    baseline_pending: bool,
    latch: ButtonLatch,
}

impl PollLoop {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self {
            name,
            interval,
            elapsed: Duration::ZERO,
            running: false,
            baseline_pending: false,
            latch: ButtonLatch::new(),
        }
    }

    pub fn gameplay() -> Self {
        Self::new("gameplay", GAMEPLAY_POLL_INTERVAL)
    }

    pub fn configuration() -> Self {
        Self::new("configuration", CONFIG_POLL_INTERVAL)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn latch(&self) -> &ButtonLatch {
        &self.latch
    }

    /// Starts (or restarts) with an empty latch: anything already held counts
    /// as a fresh press on the first sample.
    pub fn start(&mut self) {
        self.restart(false);
    }

    /// Starts with an empty latch but takes the first sample as a baseline,
    /// so buttons still held from the previous mode do not leak an edge.
    pub fn start_primed(&mut self) {
        self.restart(true);
    }

    fn restart(&mut self, primed: bool) {
        self.running = true;
        self.elapsed = Duration::ZERO;
        self.baseline_pending = primed;
        self.latch.clear();
        debug!("{} poll started", self.name);
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.elapsed = Duration::ZERO;
        self.baseline_pending = false;
        self.latch.clear();
        debug!("{} poll stopped", self.name);
    }

    /// Feeds elapsed time and returns how many polls are now due.
    pub fn due_ticks(&mut self, dt: Duration) -> u32 {
        if !self.running || self.interval.is_zero() {
            return 0;
        }
        self.elapsed = self.elapsed.saturating_add(dt);
        let mut due = 0;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            due += 1;
        }
        if due > MAX_CATCH_UP_TICKS {
            debug!(
                "{} poll dropped {} backlogged ticks",
                self.name,
                due - MAX_CATCH_UP_TICKS
            );
            due = MAX_CATCH_UP_TICKS;
        }
        due
    }

    /// One poll: at most one button-down, lowest index first.
    pub fn poll<S: GamepadSource>(&mut self, sampler: &mut InputSampler<S>) -> Option<ButtonDown> {
        if !self.running {
            return None;
        }
        let snapshot = sampler.sample()?;
        if self.baseline_pending {
            self.baseline_pending = false;
            self.latch.absorb(&snapshot);
            return None;
        }
        let down = self.latch.next_press(&snapshot);
        if let Some(down) = down {
            debug!("{} poll: button {} down", self.name, down.index);
        }
        down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::ManualGamepad;

    #[test]
    fn stopped_loop_is_never_due() {
        let mut p = PollLoop::gameplay();
        assert_eq!(p.due_ticks(Duration::from_secs(1)), 0);
    }

    #[test]
    fn due_ticks_follow_the_interval() {
        let mut p = PollLoop::configuration();
        p.start();
        assert_eq!(p.due_ticks(Duration::from_millis(30)), 0);
        assert_eq!(p.due_ticks(Duration::from_millis(30)), 1);
        assert_eq!(p.due_ticks(Duration::from_millis(100)), 2);
    }

    #[test]
    fn backlog_is_capped() {
        let mut p = PollLoop::gameplay();
        p.start();
        assert_eq!(p.due_ticks(Duration::from_secs(10)), MAX_CATCH_UP_TICKS);
    }

    #[test]
    fn disconnected_pad_yields_nothing() {
        let pad = ManualGamepad::new();
        let mut sampler = InputSampler::new(pad);
        let mut p = PollLoop::gameplay();
        p.start();
        assert_eq!(p.poll(&mut sampler), None);
    }

    #[test]
    fn primed_start_swallows_buttons_already_held() {
        let pad = ManualGamepad::connected(8);
        pad.press(3);
        let mut sampler = InputSampler::new(pad.clone());

        let mut p = PollLoop::gameplay();
        p.start_primed();
        assert_eq!(p.poll(&mut sampler), None);
        assert_eq!(p.poll(&mut sampler), None);

        pad.release(3);
        p.poll(&mut sampler);
        pad.press(3);
        assert_eq!(p.poll(&mut sampler), Some(ButtonDown::new(3)));
    }

    #[test]
    fn plain_start_reports_buttons_already_held() {
        let pad = ManualGamepad::connected(8);
        pad.press(3);
        let mut sampler = InputSampler::new(pad);

        let mut p = PollLoop::configuration();
        p.start();
        assert_eq!(p.poll(&mut sampler), Some(ButtonDown::new(3)));
    }
}
