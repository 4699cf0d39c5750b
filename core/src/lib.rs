//! Platform-agnostic core of the air-quality sensor node
//!
//! Everything here is written against the traits in `airnode-hal` and can be
//! unit tested on the host:
//!
//! - [`pms`]: PMS5003-class frame decoder with resynchronization
//! - [`watchdog`]: failure-counting recovery for the SCD4x gas sensor
//! - [`time`]: wall-clock acquisition (network time, HTTP `Date:` fallback)
//! - [`http`]: HTTP/1.1 response reading shared by the network paths
//! - [`record`]: the uploaded record and its JSON rendering
//! - [`node`]: the sampling cycle tying it all together
//!
//! ## Features
//! - `defmt`: log through `defmt` (embedded targets)
//! - `log`: log through the `log` facade (hosted builds)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod http;
pub mod node;
pub mod pms;
pub mod record;
pub mod time;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{FrameConfig, NodeConfig, TimeConfig, WatchdogConfig};
pub use error::{DecodeError, FallbackError, HttpError, ReadError, ReinitError, UploadError};
pub use node::{CachedReading, CycleIo, CycleReport, Node, PmSource, UploadOutcome};
pub use pms::{FrameDecoder, ParticulateFrame, ParticulateReading};
pub use record::Record;
pub use time::{FixedZone, IsoTimestamp, TimeAcquisition};
pub use watchdog::{GasMeasurement, GasReport, GasSensorWatchdog, WatchdogState};
