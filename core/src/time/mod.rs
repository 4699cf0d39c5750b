//! Wall-clock acquisition
//!
//! The node must never stamp a record with a wrong-but-plausible time, so the
//! wall clock only counts as valid once it is past 2023-01-01T00:00:00Z. Two
//! strategies get it there:
//!
//! 1. **Network time** (primary): the [`NetworkTime`] service is configured
//!    with the local rule and a server list and sets the clock on its own.
//! 2. **HTTP `Date:` header** (fallback): one HTTPS request to a well-known
//!    host; the response's `Date:` header sets the clock directly. Works on
//!    networks that block UDP/123.

pub mod calendar;
pub mod http_date;
pub mod zone;

use core::fmt::Write as _;

use airnode_hal::{NetworkTime, SecureTransport, WallClock};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};
use heapless::String;

use crate::config::TimeConfig;
use crate::error::FallbackError;
use crate::fmt::Dbg;
use crate::http::read_line;

pub use calendar::CivilDateTime;
pub use http_date::parse_http_date;
pub use zone::{FixedZone, IsoTimestamp};

/// 2023-01-01T00:00:00Z; anything earlier is an unset clock
pub const VALIDITY_THRESHOLD: i64 = 1_672_531_200;

/// Longest response header line kept; the rest of a longer line is dropped
const HEADER_LINE_CAPACITY: usize = 256;

const REQUEST_CAPACITY: usize = 192;

/// Whether `epoch_secs` can be a real current time
pub fn is_valid_epoch(epoch_secs: i64) -> bool {
    epoch_secs >= VALIDITY_THRESHOLD
}

/// Scan response headers for the first `Date:` line and parse it
async fn read_date_header<R: Read>(reader: &mut R) -> Result<i64, FallbackError> {
    let mut line = [0u8; HEADER_LINE_CAPACITY];

    loop {
        let len = read_line(reader, &mut line).await.map_err(|e| {
            warn!("Read error while scanning headers: {:?}", Dbg(&e));
            FallbackError::Transport
        })?;
        let Some(len) = len else {
            return Err(FallbackError::NoDateHeader);
        };

        let text = line[..len].strip_suffix(b"\r").unwrap_or(&line[..len]);
        if text.is_empty() {
            // end of headers
            return Err(FallbackError::NoDateHeader);
        }

        let Some(value) = core::str::from_utf8(text)
            .ok()
            .and_then(http_date::date_header_value)
        else {
            continue;
        };

        return parse_http_date(value).ok_or_else(|| {
            warn!("Unparseable Date header: {}", value);
            FallbackError::Parse
        });
    }
}

/// Wall-clock acquisition over the network collaborators
pub struct TimeAcquisition<N, T, W> {
    network_time: N,
    transport: T,
    clock: W,
    config: TimeConfig,
}

impl<N, T, W> TimeAcquisition<N, T, W>
where
    N: NetworkTime,
    T: SecureTransport,
    W: WallClock,
{
    pub fn new(network_time: N, transport: T, clock: W, config: TimeConfig) -> Self {
        Self {
            network_time,
            transport,
            clock,
            config,
        }
    }

    pub fn clock(&self) -> &W {
        &self.clock
    }

    /// Whether the wall clock holds a usable time
    pub fn is_valid(&self) -> bool {
        is_valid_epoch(self.clock.now_epoch())
    }

    /// Start background network time synchronization (fire-and-forget)
    pub fn start_network_sync(&mut self) {
        info!(
            "Starting network time sync (TZ {}, {} servers)",
            self.config.zone.posix,
            self.config.servers.len()
        );
        self.network_time
            .configure(self.config.zone.posix, self.config.servers);
    }

    /// Poll [`is_valid`](Self::is_valid) until network time arrives or the
    /// attempts run out
    pub async fn wait_for_network_time<D: DelayNs>(&mut self, delay: &mut D) -> bool {
        for _ in 0..self.config.sync_poll_attempts {
            if self.is_valid() {
                return true;
            }
            delay.delay_ms(self.config.sync_poll_interval_ms).await;
        }
        self.is_valid()
    }

    /// Set the wall clock from an HTTPS response's `Date:` header
    ///
    /// Returns the epoch that was applied.
    pub async fn fallback_from_http_date(&mut self) -> Result<i64, FallbackError> {
        let host = self.config.fallback_host;
        let path = self.config.fallback_path;
        let port = self.config.fallback_port;

        let mut request: String<REQUEST_CAPACITY> = String::new();
        write!(
            request,
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, host
        )
        .map_err(|_| FallbackError::Transport)?;

        debug!("Fetching Date header from {}:{}", host, port);
        let epoch = {
            let mut conn = self.transport.connect(host, port).await.map_err(|e| {
                warn!("Connect to {} failed: {:?}", host, Dbg(&e));
                FallbackError::Connect
            })?;
            conn.write_all(request.as_bytes())
                .await
                .map_err(|_| FallbackError::Transport)?;
            conn.flush().await.map_err(|_| FallbackError::Transport)?;
            read_date_header(&mut conn).await?
        };

        if !is_valid_epoch(epoch) {
            warn!("Date header epoch {} is before the validity threshold", epoch);
            return Err(FallbackError::BelowThreshold);
        }

        self.clock.set_epoch(epoch).map_err(|e| {
            error!("Failed to set wall clock: {:?}", Dbg(&e));
            FallbackError::SetClock
        })?;

        // Setting the clock does not touch the local time rule; apply it again
        self.network_time
            .configure(self.config.zone.posix, self.config.servers);

        info!("Wall clock set from HTTP Date header: {}", epoch);
        Ok(epoch)
    }

    /// Run the fallback if the clock is not valid yet; returns the validity
    pub async fn ensure_valid_time(&mut self) -> bool {
        if self.is_valid() {
            return true;
        }
        if let Err(e) = self.fallback_from_http_date().await {
            warn!("HTTP Date fallback failed: {}", e);
        }
        self.is_valid()
    }

    /// Boot-time acquisition: network time first, then the fallback
    pub async fn acquire<D: DelayNs>(&mut self, delay: &mut D) -> bool {
        self.start_network_sync();
        if self.wait_for_network_time(delay).await {
            info!("Wall clock set by network time");
            return true;
        }
        warn!("Network time unavailable, trying HTTP Date fallback");
        self.ensure_valid_time().await
    }

    /// Current local time as `YYYY-MM-DDTHH:MM:SS`, `None` while invalid
    pub fn render_local_iso(&self) -> Option<IsoTimestamp> {
        let now = self.clock.now_epoch();
        if !is_valid_epoch(now) {
            return None;
        }
        self.config.zone.render_iso(now)
    }
}
