//! Game-agnostic gamepad plumbing: sampling, edge detection, polling cadence
//! and elapsed-time countdowns. Everything is driven by explicit `tick`s, so
//! a single thread can run several loops side by side.

pub mod edge;
#[cfg(feature = "gamepad")]
pub mod gilrs_source;
pub mod poll;
pub mod sampler;
pub mod timer;

pub use edge::{ButtonDown, ButtonLatch};
pub use poll::{CONFIG_POLL_INTERVAL, GAMEPLAY_POLL_INTERVAL, PollLoop};
pub use sampler::{GamepadSnapshot, GamepadSource, InputSampler, ManualGamepad, NoGamepad};
pub use timer::Countdown;
