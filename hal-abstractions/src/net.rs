//! Network collaborator abstractions
//!
//! The node only needs four things from the network side:
//! - [`Link`]: block until the uplink is associated
//! - [`NetworkTime`]: start background network time synchronization
//! - [`SecureTransport`]: open a TLS byte stream to a host
//! - [`UploadSink`]: store one record under a key

use core::future::Future;

use embedded_io_async::{Read, Write};
use heapless::String;

/// Maximum response body retained by [`UploadResponse`]
pub const UPLOAD_BODY_CAPACITY: usize = 96;

/// Uplink association
pub trait Link {
    /// Return once the link is up, reconnecting if needed
    fn ensure_connected(&mut self) -> impl Future<Output = ()>;
}

/// Background network time service
///
/// `configure` is fire-and-forget: the service applies the result to the
/// wall clock whenever a server answers. Callers poll the wall clock to learn
/// whether it worked.
pub trait NetworkTime {
    /// (Re)start synchronization
    ///
    /// * `posix_tz` - POSIX TZ rule for local time, e.g. `"COT5"`
    /// * `servers` - server hostnames in priority order
    fn configure(&mut self, posix_tz: &str, servers: &'static [&'static str]);
}

/// TLS client transport
pub trait SecureTransport {
    /// Connection setup error
    type Error: core::fmt::Debug;

    /// An open, bidirectional byte stream. Dropping it closes the connection.
    type Connection<'a>: Read + Write
    where
        Self: 'a;

    /// Resolve `host`, connect to `port` and complete the TLS handshake
    fn connect<'a>(
        &'a mut self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Connection<'a>, Self::Error>>;
}

/// Outcome of an upload at the protocol level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    /// HTTP status code
    pub status: u16,
    /// Leading part of the response body, for diagnostics
    pub body: String<UPLOAD_BODY_CAPACITY>,
}

impl UploadResponse {
    /// Response with an empty body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// `true` for 2xx status codes
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Remote record store
pub trait UploadSink {
    /// Transport-level failure (no HTTP status available)
    type Error: core::fmt::Debug;

    /// Store `payload` (JSON) under `key`
    fn put(
        &mut self,
        key: &str,
        payload: &str,
    ) -> impl Future<Output = Result<UploadResponse, Self::Error>>;
}
