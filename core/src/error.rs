//! Error types for the node core
//!
//! None of these abort a sampling cycle; the orchestrator turns each one into
//! a fallback (cached PM reading, watchdog accounting, skipped upload).

use core::fmt;

/// PM sensor frame decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Sync word not found before the deadline
    Timeout,
    /// Stream ended or stalled inside the frame body
    Truncated,
    /// Frame does not start with the sync word
    BadSync,
    /// Length field is not 28
    BadLength,
    /// Checksum does not match the frame bytes
    BadChecksum,
    /// Both concentration groups are all zero
    AllZero,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "sync word not found before deadline"),
            Self::Truncated => write!(f, "frame truncated"),
            Self::BadSync => write!(f, "missing sync word"),
            Self::BadLength => write!(f, "bad frame length"),
            Self::BadChecksum => write!(f, "checksum mismatch"),
            Self::AllZero => write!(f, "no populated concentration fields"),
        }
    }
}

impl core::error::Error for DecodeError {}

/// Gas sensor read errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadError {
    /// Sensor has no new sample (or the readiness query failed)
    NotReady,
    /// Driver error or implausible values
    InvalidMeasurement,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "no sample ready"),
            Self::InvalidMeasurement => write!(f, "invalid measurement"),
        }
    }
}

impl core::error::Error for ReadError {}

/// Gas sensor reset sequence errors
///
/// Names the first step that failed. Later steps still run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReinitError {
    /// Driver bring-up failed
    Begin,
    /// Stopping periodic measurement failed
    Stop,
    /// Reinit command failed
    Reinit,
    /// Restarting periodic measurement failed
    Start,
}

impl fmt::Display for ReinitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "sensor bring-up failed"),
            Self::Stop => write!(f, "stop periodic measurement failed"),
            Self::Reinit => write!(f, "reinit command failed"),
            Self::Start => write!(f, "start periodic measurement failed"),
        }
    }
}

impl core::error::Error for ReinitError {}

/// Reasons the HTTP `Date:` fallback produced no clock update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FallbackError {
    /// Connection or TLS handshake failed
    Connect,
    /// Read or write on the open connection failed
    Transport,
    /// Headers ended without a `Date:` line
    NoDateHeader,
    /// `Date:` value did not match the expected grammar
    Parse,
    /// Parsed time is before the validity threshold
    BelowThreshold,
    /// Wall clock rejected the new time
    SetClock,
}

impl fmt::Display for FallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connection failed"),
            Self::Transport => write!(f, "transport error"),
            Self::NoDateHeader => write!(f, "no Date header"),
            Self::Parse => write!(f, "unparseable Date header"),
            Self::BelowThreshold => write!(f, "Date header before validity threshold"),
            Self::SetClock => write!(f, "failed to set wall clock"),
        }
    }
}

impl core::error::Error for FallbackError {}

/// Upload failures counted toward the restart policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UploadError {
    /// Server answered with a non-2xx status
    Status(u16),
    /// No response (connect, TLS, or I/O failure)
    Transport,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP status {}", code),
            Self::Transport => write!(f, "transport error"),
        }
    }
}

impl core::error::Error for UploadError {}

/// HTTP response framing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpError {
    /// Read failed on the underlying stream
    Transport,
    /// Stream closed before a status line arrived
    Closed,
    /// Status line is not `HTTP/<version> <code> ...`
    MalformedStatus,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport error"),
            Self::Closed => write!(f, "connection closed before status line"),
            Self::MalformedStatus => write!(f, "malformed status line"),
        }
    }
}

impl core::error::Error for HttpError {}
