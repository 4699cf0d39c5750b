//! Sensirion SCD4x CO₂ sensor driver
//!
//! Blocking `embedded-hal` I²C for the bus transfers, async delays for the
//! command execution times. Command framing and CRC-8 come from
//! `sensirion-i2c`.
//!
//! Only the periodic-measurement subset of the command set is implemented;
//! that is all [`Co2Sensor`] needs.

use embedded_hal::i2c::I2c;
use embedded_hal_async::delay::DelayNs;
use sensirion_i2c::i2c;

use crate::gas::{Co2Sensor, RawGasMeasurement};

/// Factory I²C address of every SCD4x part
pub const DEFAULT_ADDRESS: u8 = 0x62;

/// SCD4x commands used by this driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    StartPeriodicMeasurement,
    ReadMeasurement,
    StopPeriodicMeasurement,
    GetDataReadyStatus,
    Reinit,
}

impl Command {
    /// Command code and execution time [ms] from the datasheet
    fn as_tuple(self) -> (u16, u32) {
        match self {
            Self::StartPeriodicMeasurement => (0x21B1, 0),
            Self::ReadMeasurement => (0xEC05, 1),
            Self::StopPeriodicMeasurement => (0x3F86, 500),
            Self::GetDataReadyStatus => (0xE4B8, 1),
            Self::Reinit => (0x3646, 30),
        }
    }
}

/// SCD4x driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// I²C bus error
    I2c(E),
    /// CRC mismatch in a response word
    Crc,
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::I2c(e) => write!(f, "I2C error: {:?}", e),
            Self::Crc => write!(f, "CRC mismatch"),
        }
    }
}

impl<E: core::fmt::Debug> core::error::Error for Error<E> {}

fn from_sensirion<I: I2c>(e: i2c::Error<I>) -> Error<I::Error> {
    match e {
        i2c::Error::I2cWrite(e) | i2c::Error::I2cRead(e) => Error::I2c(e),
        i2c::Error::Crc => Error::Crc,
    }
}

/// SCD4x driver
pub struct Scd4x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C, D> Scd4x<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver for a sensor at [`DEFAULT_ADDRESS`]
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    /// Create a driver for a sensor at `address`
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    async fn write_command(&mut self, command: Command) -> Result<(), Error<I2C::Error>> {
        let (code, exec_ms) = command.as_tuple();
        i2c::write_command_u16(&mut self.i2c, self.address, code).map_err(Error::I2c)?;
        if exec_ms > 0 {
            self.delay.delay_ms(exec_ms).await;
        }
        Ok(())
    }

    async fn read_words(
        &mut self,
        command: Command,
        data: &mut [u8],
    ) -> Result<(), Error<I2C::Error>> {
        self.write_command(command).await?;
        i2c::read_words_with_crc(&mut self.i2c, self.address, data).map_err(from_sensirion)
    }
}

impl<I2C, D> Co2Sensor for Scd4x<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type Error = Error<I2C::Error>;

    /// The SCD4x needs no handshake; the reset sequence that follows does the work.
    async fn begin(&mut self) -> Result<(), Self::Error> {
        debug!("SCD4x driver bound at address {}", self.address);
        Ok(())
    }

    async fn stop_periodic_measurement(&mut self) -> Result<(), Self::Error> {
        self.write_command(Command::StopPeriodicMeasurement).await
    }

    async fn reinit(&mut self) -> Result<(), Self::Error> {
        self.write_command(Command::Reinit).await
    }

    async fn start_periodic_measurement(&mut self) -> Result<(), Self::Error> {
        self.write_command(Command::StartPeriodicMeasurement).await
    }

    /// Data is ready when any of the 11 least significant status bits is set
    async fn data_ready(&mut self) -> Result<bool, Self::Error> {
        let mut data = [0u8; 3];
        self.read_words(Command::GetDataReadyStatus, &mut data).await?;
        let status = u16::from_be_bytes([data[0], data[1]]);
        Ok(status & 0x07FF != 0)
    }

    async fn read_measurement(&mut self) -> Result<RawGasMeasurement, Self::Error> {
        let mut data = [0u8; 9];
        self.read_words(Command::ReadMeasurement, &mut data).await?;

        let co2_ppm = u16::from_be_bytes([data[0], data[1]]);
        let raw_temperature = u16::from_be_bytes([data[3], data[4]]);
        let raw_humidity = u16::from_be_bytes([data[6], data[7]]);

        Ok(RawGasMeasurement {
            co2_ppm,
            temperature: -45.0 + 175.0 * f32::from(raw_temperature) / 65535.0,
            humidity: 100.0 * f32::from(raw_humidity) / 65535.0,
        })
    }
}
