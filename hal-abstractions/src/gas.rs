//! CO₂ / temperature / humidity sensor abstraction
//!
//! Shaped after the Sensirion SCD4x command set: the sensor runs a periodic
//! measurement loop on its own and the host polls a data-ready flag before
//! fetching the latest sample.

use core::future::Future;

/// One measurement as reported by the driver, before any plausibility check
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawGasMeasurement {
    /// CO₂ concentration [ppm]
    pub co2_ppm: u16,
    /// Temperature [°C]
    pub temperature: f32,
    /// Relative humidity [%RH]
    pub humidity: f32,
}

/// Driver interface for a periodic-mode CO₂ sensor
///
/// Every operation is fallible; implementors report bus and CRC failures
/// through [`Co2Sensor::Error`] and never panic.
pub trait Co2Sensor {
    /// Driver error type
    type Error: core::fmt::Debug;

    /// Bring the driver up. Called once before the first reset sequence.
    fn begin(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Leave periodic measurement mode
    fn stop_periodic_measurement(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Reload sensor settings from EEPROM
    fn reinit(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Enter periodic measurement mode
    fn start_periodic_measurement(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Whether a new sample is waiting to be read
    fn data_ready(&mut self) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Fetch the latest sample
    fn read_measurement(&mut self) -> impl Future<Output = Result<RawGasMeasurement, Self::Error>>;
}
