#![deny(unsafe_code)]
#![deny(warnings)]
//! Clock, wall-clock and reset collaborators backed by the MCU

use airnode_hal::{Monotonic, SystemControl, WallClock};
use defmt::{info, Format};
use rtic_monotonics::Monotonic as _;

use crate::ccmram;
use crate::Mono;

/// Milliseconds since boot from the TIM2 monotonic
#[derive(Clone, Copy, Default)]
pub struct MonoClock;

impl Monotonic for MonoClock {
    fn now_ms(&self) -> u64 {
        Mono::now().ticks() / 1_000
    }
}

/// Wall-clock errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum WallClockError {
    /// Epoch does not fit the calibration store (before 1970 or after 2106)
    OutOfRange,
}

impl core::fmt::Display for WallClockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "Epoch out of range"),
        }
    }
}

impl core::error::Error for WallClockError {}

/// Wall clock derived from the monotonic timer and the CCM RAM calibration
///
/// Reads 0 (the Unix epoch, never valid) until calibrated.
#[derive(Clone, Copy, Default)]
pub struct CcmWallClock;

impl CcmWallClock {
    /// Calibrate from an externally measured Unix time
    pub fn calibrate(unix_secs: u32, unix_micros: u32) {
        let mono_micros = Mono::now().ticks();
        ccmram::calibrate_wallclock(unix_secs, unix_micros, mono_micros);
        info!("Wall-clock calibrated: {} UTC at mono={} µs", unix_secs, mono_micros);
    }
}

impl WallClock for CcmWallClock {
    type Error = WallClockError;

    fn now_epoch(&self) -> i64 {
        ccmram::now_unix_time(Mono::now().ticks())
            .and_then(|(secs, _)| i64::try_from(secs).ok())
            .unwrap_or(0)
    }

    fn set_epoch(&mut self, epoch_secs: i64) -> Result<(), WallClockError> {
        let secs = u32::try_from(epoch_secs).map_err(|_| WallClockError::OutOfRange)?;
        Self::calibrate(secs, 0);
        Ok(())
    }
}

/// Reset through the Cortex-M system control block
pub struct CortexReset;

impl SystemControl for CortexReset {
    fn restart(&mut self) -> ! {
        cortex_m::peripheral::SCB::sys_reset()
    }
}
