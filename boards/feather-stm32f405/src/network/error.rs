#![deny(unsafe_code)]
#![deny(warnings)]
//! Network client error types

use airnode_core::HttpError;
use defmt::Format;

/// Network client operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NetworkError {
    /// DNS resolution failed
    DnsError,
    /// Socket bind/connect error
    SocketError,
    /// Request timeout
    Timeout,
    /// Invalid response from server
    InvalidResponse,
    /// Server error (e.g., invalid stratum for NTP)
    ServerError,
    /// All configured servers failed
    AllServersFailed,
    /// TLS handshake failed
    TlsHandshakeFailed,
    /// TLS record layer error after the handshake
    TlsIoError,
    /// Another connection holds the TLS buffers
    TlsBuffersBusy,
    /// Request head did not fit its buffer
    RequestTooLarge,
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::ServerError => write!(f, "Server error"),
            Self::AllServersFailed => write!(f, "All servers failed"),
            Self::TlsHandshakeFailed => write!(f, "TLS handshake failed"),
            Self::TlsIoError => write!(f, "TLS I/O error"),
            Self::TlsBuffersBusy => write!(f, "TLS buffers busy"),
            Self::RequestTooLarge => write!(f, "Request too large"),
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for NetworkError {}

impl embedded_io_async::Error for NetworkError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::SocketError | Self::TlsIoError => embedded_io_async::ErrorKind::BrokenPipe,
            Self::Timeout => embedded_io_async::ErrorKind::TimedOut,
            Self::InvalidResponse => embedded_io_async::ErrorKind::InvalidData,
            _ => embedded_io_async::ErrorKind::Other,
        }
    }
}

impl From<HttpError> for NetworkError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Transport => Self::TlsIoError,
            HttpError::Closed | HttpError::MalformedStatus => Self::InvalidResponse,
        }
    }
}
