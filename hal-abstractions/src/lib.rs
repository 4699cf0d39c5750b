//! Hardware abstraction traits for the air-quality node firmware
//!
//! This crate defines the collaborator seams the node logic is written
//! against. Board support code implements these traits; `airnode-core`
//! consumes them. It also carries the SCD4x driver, which only depends on
//! `embedded-hal` and can therefore be shared across boards.
//!
//! ## Traits
//! - [`serial::ByteSource`]: buffered UART receive path for the PM sensor
//! - [`gas::Co2Sensor`]: CO₂/temperature/humidity sensor driver
//! - [`clock::Monotonic`] / [`clock::WallClock`]: tick counter and settable epoch clock
//! - [`net::NetworkTime`], [`net::SecureTransport`], [`net::UploadSink`], [`net::Link`]
//! - [`system::SystemControl`]: last-resort restart

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod clock;
pub mod gas;
pub mod net;
pub mod scd4x;
pub mod serial;
pub mod system;

pub use clock::{Monotonic, WallClock};
pub use gas::{Co2Sensor, RawGasMeasurement};
pub use net::{Link, NetworkTime, SecureTransport, UploadResponse, UploadSink};
pub use serial::ByteSource;
pub use system::SystemControl;
