//! Clock abstractions
//!
//! Two clocks with different contracts:
//! - [`Monotonic`] never goes backwards and drives deadlines and cadence
//! - [`WallClock`] is Unix epoch time which starts invalid after power-on and
//!   is set by time synchronization

/// Monotonic millisecond tick counter since boot
pub trait Monotonic {
    /// Milliseconds elapsed since an arbitrary fixed origin (usually boot)
    fn now_ms(&self) -> u64;
}

/// Settable wall clock in Unix epoch seconds
pub trait WallClock {
    /// Error raised when the clock cannot be written
    type Error: core::fmt::Debug;

    /// Current epoch seconds. Meaningless until synchronized.
    fn now_epoch(&self) -> i64;

    /// Set the clock to `epoch_secs`
    fn set_epoch(&mut self, epoch_secs: i64) -> Result<(), Self::Error>;
}
