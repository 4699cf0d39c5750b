//! Gas sensor watchdog
//!
//! The SCD4x occasionally stops publishing samples (a wedged periodic
//! measurement loop, or I²C noise). The watchdog counts consecutive failed
//! reads and runs the sensor's reset sequence once the count reaches the
//! configured threshold:
//!
//! ```text
//!            read ok                   read failed (n < threshold)
//!   Running <─────── Faulting(n) ──────────────────> Faulting(n + 1)
//!      ^                 │
//!      │                 │ read failed (n + 1 == threshold)
//!      │                 v
//!      └───────────── Recovering   stop, settle, reinit, settle, start
//! ```
//!
//! Recovery runs to completion inside the caller's task, so the sensor is
//! never read while it is being reset. If that future is dropped halfway the
//! state stays `Recovering`; [`GasSensorWatchdog::read`] refuses to read and
//! [`GasSensorWatchdog::read_checked`] runs the sequence again.

use airnode_hal::{Co2Sensor, RawGasMeasurement};
use embedded_hal_async::delay::DelayNs;

use crate::config::WatchdogConfig;
use crate::error::{ReadError, ReinitError};
use crate::fmt::Dbg;

/// Watchdog state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WatchdogState {
    /// Last read succeeded (or nothing has failed yet)
    Running,
    /// `n` consecutive reads have failed, `n` below the threshold
    Faulting(u8),
    /// Reset sequence in progress
    Recovering,
}

/// A gas sample that passed the plausibility checks
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GasMeasurement {
    /// CO₂ [ppm], never 0 or 0xFFFF
    pub co2_ppm: u16,
    /// Temperature [°C], finite
    pub temperature: f32,
    /// Relative humidity [%], finite
    pub humidity: f32,
}

impl TryFrom<RawGasMeasurement> for GasMeasurement {
    type Error = ReadError;

    fn try_from(raw: RawGasMeasurement) -> Result<Self, ReadError> {
        let plausible = raw.co2_ppm != 0
            && raw.co2_ppm != u16::MAX
            && raw.temperature.is_finite()
            && raw.humidity.is_finite();
        if !plausible {
            return Err(ReadError::InvalidMeasurement);
        }
        Ok(Self {
            co2_ppm: raw.co2_ppm,
            temperature: raw.temperature,
            humidity: raw.humidity,
        })
    }
}

/// Outcome of [`GasSensorWatchdog::read_checked`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasReport {
    pub result: Result<GasMeasurement, ReadError>,
    /// Set when this read ran the reset sequence
    pub reinit: Option<Result<(), ReinitError>>,
}

/// Failure-counting wrapper around a [`Co2Sensor`]
pub struct GasSensorWatchdog<S, D> {
    sensor: S,
    delay: D,
    config: WatchdogConfig,
    state: WatchdogState,
    reinit_count: u32,
}

impl<S, D> GasSensorWatchdog<S, D>
where
    S: Co2Sensor,
    D: DelayNs,
{
    pub fn new(sensor: S, delay: D, config: WatchdogConfig) -> Self {
        Self {
            sensor,
            delay,
            config,
            state: WatchdogState::Running,
            reinit_count: 0,
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Consecutive failures since the last success or reset
    pub fn failures(&self) -> u8 {
        match self.state {
            WatchdogState::Faulting(n) => n,
            _ => 0,
        }
    }

    /// Number of reset sequences run after startup
    pub fn reinit_count(&self) -> u32 {
        self.reinit_count
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// Bring the driver up and put the sensor into periodic measurement
    pub async fn initialize(&mut self) -> Result<(), ReinitError> {
        self.state = WatchdogState::Recovering;
        let begin = self.sensor.begin().await.map_err(|e| {
            error!("Gas sensor bring-up failed: {:?}", Dbg(&e));
            ReinitError::Begin
        });
        let reset = self.reset_sequence().await;
        self.state = WatchdogState::Running;
        let result = begin.and(reset);
        match result {
            Ok(()) => info!("Gas sensor initialized"),
            Err(e) => warn!("Gas sensor initialized with errors: {:?}", e),
        }
        result
    }

    /// Driver readiness flag; a bus error reads as "not ready"
    pub async fn poll_ready(&mut self) -> bool {
        match self.sensor.data_ready().await {
            Ok(ready) => ready,
            Err(e) => {
                debug!("Gas sensor data-ready query failed: {:?}", Dbg(&e));
                false
            }
        }
    }

    /// Fetch and validate one sample without touching the watchdog state
    ///
    /// Reports [`ReadError::NotReady`] while a reset sequence is unfinished.
    pub async fn read(&mut self) -> Result<GasMeasurement, ReadError> {
        if self.state == WatchdogState::Recovering {
            debug!("Gas sensor reset unfinished, not reading");
            return Err(ReadError::NotReady);
        }

        if !self.poll_ready().await {
            return Err(ReadError::NotReady);
        }

        let raw = self.sensor.read_measurement().await.map_err(|e| {
            warn!("Gas sensor read failed: {:?}", Dbg(&e));
            ReadError::InvalidMeasurement
        })?;

        GasMeasurement::try_from(raw).inspect_err(|_| {
            warn!(
                "Implausible gas sample: co2={} t={} rh={}",
                raw.co2_ppm,
                raw.temperature,
                raw.humidity
            );
        })
    }

    /// Count one failed read, resetting the sensor at the threshold
    ///
    /// Returns the outcome of the reset sequence when one ran.
    pub async fn record_failure(&mut self) -> Option<Result<(), ReinitError>> {
        let failures = self.failures().saturating_add(1);
        if failures < self.config.failure_threshold {
            self.state = WatchdogState::Faulting(failures);
            return None;
        }

        warn!("Gas sensor failed {} times in a row, reinitializing", failures);
        Some(self.recover().await)
    }

    /// Count one successful read
    pub fn record_success(&mut self) {
        self.state = WatchdogState::Running;
    }

    /// [`read`](Self::read) followed by the matching failure/success accounting
    ///
    /// A reset sequence abandoned halfway (its future was dropped) is run
    /// again before reading and reported in [`GasReport::reinit`].
    pub async fn read_checked(&mut self) -> GasReport {
        let resumed = if self.state == WatchdogState::Recovering {
            warn!("Gas sensor reset was abandoned, running it again");
            Some(self.recover().await)
        } else {
            None
        };

        match self.read().await {
            Ok(measurement) => {
                self.record_success();
                GasReport {
                    result: Ok(measurement),
                    reinit: resumed,
                }
            }
            Err(e) => {
                debug!("Gas read failed: {:?} (failures so far: {})", e, self.failures());
                let reinit = self.record_failure().await;
                GasReport {
                    result: Err(e),
                    reinit: reinit.or(resumed),
                }
            }
        }
    }

    async fn recover(&mut self) -> Result<(), ReinitError> {
        self.state = WatchdogState::Recovering;
        let result = self.reset_sequence().await;
        self.reinit_count = self.reinit_count.wrapping_add(1);
        self.state = WatchdogState::Running;

        match result {
            Ok(()) => info!("Gas sensor reinitialized"),
            Err(e) => error!("Gas sensor reinit incomplete: {:?}", e),
        }
        result
    }

    /// Stop, settle, reinit, settle, start
    ///
    /// Every step runs even if an earlier one failed; the first failure is
    /// returned.
    async fn reset_sequence(&mut self) -> Result<(), ReinitError> {
        let mut first_failure = None;

        if let Err(e) = self.sensor.stop_periodic_measurement().await {
            warn!("stop_periodic_measurement failed: {:?}", Dbg(&e));
            first_failure.get_or_insert(ReinitError::Stop);
        }
        self.delay.delay_ms(self.config.stop_settle_ms).await;

        if let Err(e) = self.sensor.reinit().await {
            warn!("reinit failed: {:?}", Dbg(&e));
            first_failure.get_or_insert(ReinitError::Reinit);
        }
        self.delay.delay_ms(self.config.reinit_settle_ms).await;

        if let Err(e) = self.sensor.start_periodic_measurement().await {
            warn!("start_periodic_measurement failed: {:?}", Dbg(&e));
            first_failure.get_or_insert(ReinitError::Start);
        }

        first_failure.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{good_sample, FakeError, FakeGasSensor, RecordingDelay};
    use embassy_futures::block_on;

    fn watchdog(sensor: FakeGasSensor) -> GasSensorWatchdog<FakeGasSensor, RecordingDelay> {
        GasSensorWatchdog::new(sensor, RecordingDelay::default(), WatchdogConfig::default())
    }

    #[test]
    fn test_initialize_runs_reset_sequence() {
        let mut wd = watchdog(FakeGasSensor::default());
        assert_eq!(block_on(wd.initialize()), Ok(()));
        assert_eq!(wd.sensor().calls, ["begin", "stop", "reinit", "start"]);
        assert_eq!(wd.delay.calls_ns, [200_000_000, 1_000_000_000]);
        assert_eq!(wd.state(), WatchdogState::Running);
        assert_eq!(wd.reinit_count(), 0);
    }

    #[test]
    fn test_read_valid_sample() {
        let mut wd = watchdog(FakeGasSensor::default());
        let m = block_on(wd.read()).unwrap();
        assert_eq!(m.co2_ppm, good_sample().co2_ppm);
        assert_eq!(wd.state(), WatchdogState::Running);
    }

    #[test]
    fn test_not_ready_does_not_read() {
        let mut sensor = FakeGasSensor::default();
        sensor.ready.push_back(Ok(false));
        sensor.ready.push_back(Err(FakeError));
        let mut wd = watchdog(sensor);

        assert_eq!(block_on(wd.read()), Err(ReadError::NotReady));
        assert_eq!(block_on(wd.read()), Err(ReadError::NotReady));
        assert_eq!(wd.sensor().count("read"), 0);
        assert_eq!(wd.state(), WatchdogState::Running);
    }

    #[test]
    fn test_implausible_samples_rejected() {
        let mut sensor = FakeGasSensor::default();
        for co2 in [0, u16::MAX] {
            sensor.samples.push_back(Ok(RawGasMeasurement {
                co2_ppm: co2,
                ..good_sample()
            }));
        }
        sensor.samples.push_back(Ok(RawGasMeasurement {
            temperature: f32::NAN,
            ..good_sample()
        }));
        sensor.samples.push_back(Ok(RawGasMeasurement {
            humidity: f32::INFINITY,
            ..good_sample()
        }));
        sensor.samples.push_back(Err(FakeError));
        let mut wd = watchdog(sensor);

        for _ in 0..5 {
            assert_eq!(block_on(wd.read()), Err(ReadError::InvalidMeasurement));
        }
    }

    #[test]
    fn test_reinit_after_three_failures() {
        let mut wd = watchdog(FakeGasSensor::failing_reads(7));

        let first = block_on(wd.read_checked());
        assert_eq!(first.result, Err(ReadError::InvalidMeasurement));
        assert_eq!(first.reinit, None);
        assert_eq!(wd.state(), WatchdogState::Faulting(1));

        assert_eq!(block_on(wd.read_checked()).reinit, None);
        assert_eq!(wd.state(), WatchdogState::Faulting(2));

        assert_eq!(block_on(wd.read_checked()).reinit, Some(Ok(())));
        assert_eq!(wd.state(), WatchdogState::Running);
        assert_eq!(wd.reinit_count(), 1);
        assert_eq!(wd.sensor().count("reinit"), 1);

        // Seven failures: reinit after the third and sixth only
        for _ in 0..4 {
            block_on(wd.read_checked());
        }
        assert_eq!(wd.reinit_count(), 2);
        assert_eq!(wd.failures(), 1);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut sensor = FakeGasSensor::failing_reads(2);
        sensor.samples.push_back(Ok(good_sample()));
        sensor.samples.push_back(Err(FakeError));
        sensor.samples.push_back(Err(FakeError));
        let mut wd = watchdog(sensor);

        for _ in 0..5 {
            assert_eq!(block_on(wd.read_checked()).reinit, None);
        }
        assert_eq!(wd.failures(), 2);
        assert_eq!(wd.reinit_count(), 0);
    }

    #[test]
    fn test_not_ready_counts_as_failure() {
        let mut sensor = FakeGasSensor::default();
        for _ in 0..3 {
            sensor.ready.push_back(Ok(false));
        }
        let mut wd = watchdog(sensor);

        for _ in 0..3 {
            assert_eq!(block_on(wd.read_checked()).result, Err(ReadError::NotReady));
        }
        assert_eq!(wd.reinit_count(), 1);
    }

    #[test]
    fn test_reinit_is_best_effort() {
        let mut sensor = FakeGasSensor::failing_reads(3);
        sensor.fail_stop = true;
        sensor.fail_start = true;
        let mut wd = watchdog(sensor);

        block_on(wd.read_checked());
        block_on(wd.read_checked());
        let report = block_on(wd.read_checked());

        assert_eq!(report.reinit, Some(Err(ReinitError::Stop)));
        // later steps still ran and the counter was cleared
        assert_eq!(wd.sensor().count("reinit"), 1);
        assert_eq!(wd.sensor().count("start"), 1);
        assert_eq!(wd.failures(), 0);
    }

    #[test]
    fn test_read_leaves_unfinished_reset_alone() {
        let mut wd = watchdog(FakeGasSensor::default());
        wd.state = WatchdogState::Recovering;

        assert_eq!(block_on(wd.read()), Err(ReadError::NotReady));
        assert!(wd.sensor().calls.is_empty());
        assert_eq!(wd.state(), WatchdogState::Recovering);
        assert_eq!(wd.reinit_count(), 0);
    }

    #[test]
    fn test_abandoned_recovery_completes_before_checked_read() {
        let mut wd = watchdog(FakeGasSensor::default());
        wd.state = WatchdogState::Recovering;

        let report = block_on(wd.read_checked());
        assert!(report.result.is_ok());
        assert_eq!(report.reinit, Some(Ok(())));
        assert_eq!(wd.sensor().calls, ["stop", "reinit", "start", "ready", "read"]);
        assert_eq!(wd.reinit_count(), 1);
        assert_eq!(wd.state(), WatchdogState::Running);
    }

    #[test]
    fn test_initialize_reports_failed_bring_up() {
        let mut sensor = FakeGasSensor::default();
        sensor.fail_begin = true;
        let mut wd = watchdog(sensor);

        assert_eq!(block_on(wd.initialize()), Err(ReinitError::Begin));
        // the reset sequence still ran
        assert_eq!(wd.sensor().calls, ["begin", "stop", "reinit", "start"]);
        assert_eq!(wd.state(), WatchdogState::Running);
    }
}
