//! Sampling cycle orchestration
//!
//! One cycle, start to finish, in a single task:
//!
//! 1. make sure the uplink is up
//! 2. read the gas sensor through the watchdog
//! 3. decode a PM frame, falling back to the last good reading
//! 4. make sure the wall clock is valid; without a valid time nothing is sent
//! 5. render the record and upload it under the local ISO timestamp
//! 6. account the upload outcome toward the restart policy
//!
//! Failures in steps 2 and 3 degrade the record (null fields) but never abort
//! the cycle.

use airnode_hal::{
    ByteSource, Co2Sensor, Link, Monotonic, NetworkTime, SecureTransport, SystemControl,
    UploadSink, WallClock,
};
use embedded_hal_async::delay::DelayNs;

use crate::config::NodeConfig;
use crate::error::{DecodeError, UploadError};
use crate::fmt::Dbg;
use crate::pms::{FrameDecoder, ParticulateReading};
use crate::record::Record;
use crate::time::{IsoTimestamp, TimeAcquisition};
use crate::watchdog::{GasReport, GasSensorWatchdog};

/// A successful PM reading and when it was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CachedReading {
    pub reading: ParticulateReading,
    /// Monotonic time of the decode
    pub sampled_at_ms: u64,
}

/// Where a cycle's PM values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PmSource {
    /// Decoded in this cycle
    Fresh,
    /// Decode failed; last known good reading reused
    Cached { age_ms: u64 },
    /// Decode failed and nothing was cached yet
    Unavailable,
}

/// What happened to a cycle's record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UploadOutcome {
    /// Not attempted (no valid time, or the record did not render)
    Skipped,
    /// Stored; carries the 2xx status
    Stored(u16),
    Failed(UploadError),
}

/// Summary of one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub gas: GasReport,
    pub pm: Option<ParticulateReading>,
    pub pm_source: PmSource,
    /// Set when this cycle's decode failed
    pub pm_error: Option<DecodeError>,
    pub timestamp: Option<IsoTimestamp>,
    pub upload: UploadOutcome,
    /// The consecutive upload failure limit was reached
    pub restart_requested: bool,
}

/// Per-cycle collaborators the node borrows from the caller
pub struct CycleIo<'a, B, M, L, U> {
    pub serial: &'a mut B,
    pub clock: &'a M,
    pub link: &'a mut L,
    pub sink: &'a mut U,
}

/// The sampling node
pub struct Node<S, D, N, T, W> {
    config: NodeConfig,
    decoder: FrameDecoder,
    watchdog: GasSensorWatchdog<S, D>,
    time: TimeAcquisition<N, T, W>,
    last_known_good: Option<CachedReading>,
    upload_failures: u8,
    last_cycle_ms: u64,
}

impl<S, D, N, T, W> Node<S, D, N, T, W>
where
    S: Co2Sensor,
    D: DelayNs,
    N: NetworkTime,
    T: SecureTransport,
    W: WallClock,
{
    /// Assemble a node
    ///
    /// * `sensor`, `delay` - gas sensor driver and the delay its reset sequence waits on
    /// * `network_time`, `transport`, `wall_clock` - wall-clock acquisition collaborators
    pub fn new(
        config: NodeConfig,
        sensor: S,
        delay: D,
        network_time: N,
        transport: T,
        wall_clock: W,
    ) -> Self {
        Self {
            decoder: FrameDecoder::new(config.frame.clone()),
            watchdog: GasSensorWatchdog::new(sensor, delay, config.watchdog.clone()),
            time: TimeAcquisition::new(network_time, transport, wall_clock, config.time.clone()),
            config,
            last_known_good: None,
            upload_failures: 0,
            last_cycle_ms: 0,
        }
    }

    pub fn watchdog(&self) -> &GasSensorWatchdog<S, D> {
        &self.watchdog
    }

    pub fn time(&self) -> &TimeAcquisition<N, T, W> {
        &self.time
    }

    pub fn last_known_good(&self) -> Option<CachedReading> {
        self.last_known_good
    }

    /// Consecutive failed uploads
    pub fn upload_failures(&self) -> u8 {
        self.upload_failures
    }

    /// Boot sequence: acquire wall-clock time, then bring up the gas sensor
    ///
    /// Returns whether the wall clock is valid. An invalid clock is retried
    /// by every cycle.
    pub async fn start<Dl: DelayNs>(&mut self, delay: &mut Dl) -> bool {
        let time_valid = self.time.acquire(delay).await;
        match self.time.render_local_iso() {
            Some(now) => info!("Clock OK: {}", now.as_str()),
            None => warn!("Clock not valid yet, will retry every cycle"),
        }

        if let Err(e) = self.watchdog.initialize().await {
            error!("Gas sensor initialization incomplete: {}", e);
        }
        time_valid
    }

    /// Whether a full cycle interval has passed since the last cycle start
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.wrapping_sub(self.last_cycle_ms) >= self.config.cycle_interval_ms
    }

    /// Run a cycle if one is due
    pub async fn poll<B, M, L, U>(&mut self, io: CycleIo<'_, B, M, L, U>) -> Option<CycleReport>
    where
        B: ByteSource,
        M: Monotonic,
        L: Link,
        U: UploadSink,
    {
        let now = io.clock.now_ms();
        if !self.is_due(now) {
            return None;
        }
        self.last_cycle_ms = now;
        Some(self.run_cycle(io).await)
    }

    /// Run one sampling cycle unconditionally
    pub async fn run_cycle<B, M, L, U>(&mut self, io: CycleIo<'_, B, M, L, U>) -> CycleReport
    where
        B: ByteSource,
        M: Monotonic,
        L: Link,
        U: UploadSink,
    {
        io.link.ensure_connected().await;

        let gas = self.watchdog.read_checked().await;
        if let Err(e) = gas.result {
            warn!("No gas sample this cycle: {} (failures: {})", e, self.watchdog.failures());
        }

        let (pm, pm_source, pm_error) = self.read_particulates(io.serial, io.clock).await;

        let mut report = CycleReport {
            gas,
            pm,
            pm_source,
            pm_error,
            timestamp: None,
            upload: UploadOutcome::Skipped,
            restart_requested: false,
        };

        if !self.time.ensure_valid_time().await {
            warn!("No valid time, skipping upload");
            return report;
        }
        let Some(timestamp) = self.time.render_local_iso() else {
            warn!("Timestamp rendering failed, skipping upload");
            return report;
        };

        let record = Record::new(gas.result.as_ref().ok(), pm.as_ref());
        report.upload = self.upload(io.sink, &timestamp, &record).await;
        report.timestamp = Some(timestamp);

        if let UploadOutcome::Failed(e) = report.upload {
            self.upload_failures = self.upload_failures.saturating_add(1);
            warn!(
                "Upload failed: {} ({} in a row)",
                e, self.upload_failures
            );
            if self.upload_failures >= self.config.upload_failure_limit {
                error!("Too many consecutive upload failures, requesting restart");
                report.restart_requested = true;
            }
        } else if let UploadOutcome::Stored(_) = report.upload {
            self.upload_failures = 0;
        }

        report
    }

    /// Restart the device if `report` asks for it, after the grace delay
    pub async fn restart_if_requested<C, Dl>(
        &self,
        report: &CycleReport,
        system: &mut C,
        delay: &mut Dl,
    ) where
        C: SystemControl,
        Dl: DelayNs,
    {
        if !report.restart_requested {
            return;
        }
        error!("Restarting in {} ms", self.config.restart_delay_ms);
        delay.delay_ms(self.config.restart_delay_ms).await;
        system.restart()
    }

    async fn read_particulates<B, M>(
        &mut self,
        serial: &mut B,
        clock: &M,
    ) -> (Option<ParticulateReading>, PmSource, Option<DecodeError>)
    where
        B: ByteSource,
        M: Monotonic,
    {
        match self.decoder.decode(serial, clock).await {
            Ok(reading) => {
                self.last_known_good = Some(CachedReading {
                    reading,
                    sampled_at_ms: clock.now_ms(),
                });
                (Some(reading), PmSource::Fresh, None)
            }
            Err(e) => match self.last_known_good {
                Some(cached) => {
                    let age_ms = clock.now_ms().wrapping_sub(cached.sampled_at_ms);
                    warn!("PM frame invalid ({}), reusing reading from {} ms ago", e, age_ms);
                    (Some(cached.reading), PmSource::Cached { age_ms }, Some(e))
                }
                None => {
                    warn!("PM frame invalid ({}), no previous reading", e);
                    (None, PmSource::Unavailable, Some(e))
                }
            },
        }
    }

    async fn upload<U: UploadSink>(
        &mut self,
        sink: &mut U,
        key: &IsoTimestamp,
        record: &Record,
    ) -> UploadOutcome {
        let Ok(json) = record.to_json() else {
            error!("Record does not fit the payload buffer");
            return UploadOutcome::Skipped;
        };
        debug!("PUT {}: {}", key.as_str(), json.as_str());

        match sink.put(key, &json).await {
            Ok(response) if response.is_success() => {
                info!("Stored {} (HTTP {})", key.as_str(), response.status);
                UploadOutcome::Stored(response.status)
            }
            Ok(response) => {
                warn!(
                    "Upload rejected: HTTP {} {}",
                    response.status,
                    response.body.as_str()
                );
                UploadOutcome::Failed(UploadError::Status(response.status))
            }
            Err(e) => {
                warn!("Upload transport error: {:?}", Dbg(&e));
                UploadOutcome::Failed(UploadError::Transport)
            }
        }
    }
}
