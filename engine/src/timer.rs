use std::time::Duration;

/// A one-shot timer driven by fed-in elapsed time.
///
/// Armed with a limit, it fires exactly once on the tick that reaches the
/// limit and then disarms itself. A disarmed countdown ignores ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Countdown {
    elapsed: Duration,
    limit: Duration,
    armed: bool,
}

impl Countdown {
    pub const fn idle() -> Self {
        Self {
            elapsed: Duration::ZERO,
            limit: Duration::ZERO,
            armed: false,
        }
    }

    pub fn armed(limit: Duration) -> Self {
        let mut countdown = Self::idle();
        countdown.arm(limit);
        countdown
    }

    /// (Re)starts from zero.
    pub fn arm(&mut self, limit: Duration) {
        self.elapsed = Duration::ZERO;
        self.limit = limit;
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.elapsed = Duration::ZERO;
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn remaining(&self) -> Duration {
        if !self.armed {
            return Duration::ZERO;
        }
        self.limit.saturating_sub(self.elapsed)
    }

    /// Fraction of the limit already spent, 0.0 when disarmed.
    pub fn progress(&self) -> f32 {
        if !self.armed || self.limit.is_zero() {
            return 0.0;
        }
        (self.elapsed.as_secs_f32() / self.limit.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn tick(&mut self, dt: Duration) -> bool {
        self.tick_overflow(dt).is_some()
    }

    /// Like [`Countdown::tick`], but on firing returns how far past the limit
    /// the fed time went, so callers can chain the remainder into the next
    /// step.
    pub fn tick_overflow(&mut self, dt: Duration) -> Option<Duration> {
        if !self.armed {
            return None;
        }
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed < self.limit {
            return None;
        }
        let overflow = self.elapsed - self.limit;
        self.disarm();
        Some(overflow)
    }
}
