//! Hand-written collaborator fakes shared by the unit tests

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

use airnode_hal::{
    ByteSource, Co2Sensor, Link, Monotonic, NetworkTime, RawGasMeasurement, SecureTransport,
    UploadResponse, UploadSink, WallClock,
};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

/// Error returned by every fake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError;

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fake failure")
    }
}

impl core::error::Error for FakeError {}

impl embedded_io_async::Error for FakeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Monotonic clock that advances by `step` ms every time it is read
pub struct StepClock {
    now: Cell<u64>,
    step: u64,
}

impl StepClock {
    pub fn new(step: u64) -> Self {
        Self::starting_at(0, step)
    }

    pub fn starting_at(now: u64, step: u64) -> Self {
        Self {
            now: Cell::new(now),
            step,
        }
    }

    /// Current value without advancing
    pub fn peek(&self) -> u64 {
        self.now.get()
    }

    pub fn set(&self, now: u64) {
        self.now.set(now);
    }
}

impl Monotonic for StepClock {
    fn now_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step));
        now
    }
}

/// Byte source backed by a queue
pub struct FakeSerial {
    rx: VecDeque<u8>,
    /// Delivered only to a blocking read, as if arriving while it waits
    late: VecDeque<u8>,
    endless: Option<u8>,
    reads: usize,
    waits: Vec<u32>,
}

impl FakeSerial {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            rx: bytes.iter().copied().collect(),
            late: VecDeque::new(),
            endless: None,
            reads: 0,
            waits: Vec::new(),
        }
    }

    /// A source with nothing buffered whose bytes arrive during blocking reads
    pub fn arriving(bytes: &[u8]) -> Self {
        let mut serial = Self::new(&[]);
        serial.late = bytes.iter().copied().collect();
        serial
    }

    /// A source that never runs dry and never reports a backlog
    pub fn endless(byte: u8) -> Self {
        Self {
            endless: Some(byte),
            ..Self::new(&[])
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn remaining(&self) -> Vec<u8> {
        self.rx.iter().copied().collect()
    }

    /// Number of single-byte reads served
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Timeouts passed to each blocking read
    pub fn waits(&self) -> &[u32] {
        &self.waits
    }
}

impl ByteSource for FakeSerial {
    fn available(&mut self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.rx.pop_front().or(self.endless);
        if byte.is_some() {
            self.reads += 1;
        }
        byte
    }

    async fn read_exact_timeout(&mut self, buf: &mut [u8], timeout_ms: u32) -> usize {
        self.waits.push(timeout_ms);
        let mut n = 0;
        while n < buf.len() {
            let next = self.rx.pop_front().or_else(|| self.late.pop_front());
            match next.or(self.endless) {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

/// Delay that returns immediately and records what was asked of it
#[derive(Default)]
pub struct RecordingDelay {
    pub calls_ns: Vec<u32>,
}

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.calls_ns.iter().map(|ns| u64::from(*ns)).sum::<u64>() / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls_ns.push(ns);
    }
}

/// A plausible SCD4x sample
pub fn good_sample() -> RawGasMeasurement {
    RawGasMeasurement {
        co2_ppm: 612,
        temperature: 23.456,
        humidity: 48.1,
    }
}

/// Scripted CO₂ sensor
///
/// Readiness and samples are taken from the queues; once a queue is empty
/// the sensor is ready and returns [`good_sample`].
#[derive(Default)]
pub struct FakeGasSensor {
    pub ready: VecDeque<Result<bool, FakeError>>,
    pub samples: VecDeque<Result<RawGasMeasurement, FakeError>>,
    pub fail_begin: bool,
    pub fail_stop: bool,
    pub fail_reinit: bool,
    pub fail_start: bool,
    pub calls: Vec<&'static str>,
}

impl FakeGasSensor {
    /// Queue `n` failing reads
    pub fn failing_reads(n: usize) -> Self {
        let mut sensor = Self::default();
        for _ in 0..n {
            sensor.samples.push_back(Err(FakeError));
        }
        sensor
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    fn step(&mut self, call: &'static str, fail: bool) -> Result<(), FakeError> {
        self.calls.push(call);
        if fail {
            Err(FakeError)
        } else {
            Ok(())
        }
    }
}

impl Co2Sensor for FakeGasSensor {
    type Error = FakeError;

    async fn begin(&mut self) -> Result<(), FakeError> {
        let fail = self.fail_begin;
        self.step("begin", fail)
    }

    async fn stop_periodic_measurement(&mut self) -> Result<(), FakeError> {
        let fail = self.fail_stop;
        self.step("stop", fail)
    }

    async fn reinit(&mut self) -> Result<(), FakeError> {
        let fail = self.fail_reinit;
        self.step("reinit", fail)
    }

    async fn start_periodic_measurement(&mut self) -> Result<(), FakeError> {
        let fail = self.fail_start;
        self.step("start", fail)
    }

    async fn data_ready(&mut self) -> Result<bool, FakeError> {
        self.calls.push("ready");
        self.ready.pop_front().unwrap_or(Ok(true))
    }

    async fn read_measurement(&mut self) -> Result<RawGasMeasurement, FakeError> {
        self.calls.push("read");
        self.samples.pop_front().unwrap_or(Ok(good_sample()))
    }
}

/// Wall clock whose epoch is shared with [`FakeNetworkTime`]
pub struct FakeWallClock {
    pub epoch: Rc<Cell<i64>>,
    pub fail_set: bool,
}

impl FakeWallClock {
    pub fn new(epoch: i64) -> Self {
        Self {
            epoch: Rc::new(Cell::new(epoch)),
            fail_set: false,
        }
    }
}

impl WallClock for FakeWallClock {
    type Error = FakeError;

    fn now_epoch(&self) -> i64 {
        self.epoch.get()
    }

    fn set_epoch(&mut self, epoch_secs: i64) -> Result<(), FakeError> {
        if self.fail_set {
            return Err(FakeError);
        }
        self.epoch.set(epoch_secs);
        Ok(())
    }
}

/// Network time service that either sets the shared epoch right away or
/// never answers
pub struct FakeNetworkTime {
    epoch: Rc<Cell<i64>>,
    pub answer: Option<i64>,
    pub configured: Vec<(String, &'static [&'static str])>,
}

impl FakeNetworkTime {
    pub fn silent(clock: &FakeWallClock) -> Self {
        Self {
            epoch: clock.epoch.clone(),
            answer: None,
            configured: Vec::new(),
        }
    }

    pub fn answering(clock: &FakeWallClock, epoch: i64) -> Self {
        Self {
            answer: Some(epoch),
            ..Self::silent(clock)
        }
    }
}

impl NetworkTime for FakeNetworkTime {
    fn configure(&mut self, posix_tz: &str, servers: &'static [&'static str]) {
        self.configured.push((posix_tz.to_string(), servers));
        if let Some(epoch) = self.answer {
            self.epoch.set(epoch);
        }
    }
}

/// TLS transport serving a canned response and recording the request
#[derive(Default)]
pub struct FakeTransport {
    pub response: Vec<u8>,
    pub fail_connect: bool,
    pub fail_read: bool,
    pub sent: Vec<u8>,
    pub connects: Vec<(String, u16)>,
}

impl FakeTransport {
    pub fn responding(response: &str) -> Self {
        Self {
            response: response.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }
}

pub struct FakeConnection<'a> {
    rx: &'a [u8],
    tx: &'a mut Vec<u8>,
    fail_read: bool,
}

impl ErrorType for FakeConnection<'_> {
    type Error = FakeError;
}

impl Read for FakeConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FakeError> {
        if self.fail_read {
            return Err(FakeError);
        }
        let n = buf.len().min(self.rx.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx = &self.rx[n..];
        Ok(n)
    }
}

impl Write for FakeConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, FakeError> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), FakeError> {
        Ok(())
    }
}

impl SecureTransport for FakeTransport {
    type Error = FakeError;
    type Connection<'a>
        = FakeConnection<'a>
    where
        Self: 'a;

    async fn connect<'a>(
        &'a mut self,
        host: &str,
        port: u16,
    ) -> Result<FakeConnection<'a>, FakeError> {
        self.connects.push((host.to_string(), port));
        if self.fail_connect {
            return Err(FakeError);
        }
        Ok(FakeConnection {
            rx: &self.response,
            tx: &mut self.sent,
            fail_read: self.fail_read,
        })
    }
}

/// Upload sink answering from a script (default: 200)
#[derive(Default)]
pub struct FakeSink {
    pub responses: VecDeque<Result<u16, FakeError>>,
    pub puts: Vec<(String, String)>,
}

impl FakeSink {
    pub fn failing(n: usize, status: u16) -> Self {
        let mut sink = Self::default();
        for _ in 0..n {
            sink.responses.push_back(Ok(status));
        }
        sink
    }
}

impl UploadSink for FakeSink {
    type Error = FakeError;

    async fn put(&mut self, key: &str, payload: &str) -> Result<UploadResponse, FakeError> {
        self.puts.push((key.to_string(), payload.to_string()));
        self.responses
            .pop_front()
            .unwrap_or(Ok(200))
            .map(UploadResponse::new)
    }
}

#[derive(Default)]
pub struct FakeLink {
    pub checks: usize,
}

impl Link for FakeLink {
    async fn ensure_connected(&mut self) {
        self.checks += 1;
    }
}
