#![deny(unsafe_code)]
#![deny(warnings)]
//! SNTP time synchronization
//!
//! [`SntpService`] is the node's [`NetworkTime`] collaborator: `configure`
//! only hands the server list to [`run`], the background loop that owns
//! the UDP socket, calibrates the wall clock on every answer and resyncs
//! periodically.

use airnode_hal::NetworkTime;
use defmt::{error, info, warn, Debug2Format};
use embassy_futures::select::{select, Either};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

use crate::platform::CcmWallClock;

use super::config::SntpConfig;
use super::error::NetworkError;
use super::manager;

/// NTP epoch (1900) to Unix epoch (1970)
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

const NTP_PORT: u16 = 123;
const NTP_PACKET_LEN: usize = 48;

/// Server list handed from [`SntpService`] to [`run`]
static SERVERS: Signal<CriticalSectionRawMutex, &'static [&'static str]> = Signal::new();

/// Unix time with microsecond resolution
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    pub unix_secs: u64,
    pub micros: u32,
}

impl Timestamp {
    /// From an NTP transmit timestamp (seconds since 1900, 2^-32 fraction)
    pub fn from_ntp(ntp_secs: u64, ntp_frac: u32) -> Self {
        Self {
            unix_secs: ntp_secs.saturating_sub(NTP_UNIX_OFFSET_SECS),
            micros: ((u64::from(ntp_frac) * 1_000_000) >> 32) as u32,
        }
    }
}

/// Starts and redirects the background SNTP loop
#[derive(Clone, Copy, Default)]
pub struct SntpService;

impl NetworkTime for SntpService {
    fn configure(&mut self, posix_tz: &str, servers: &'static [&'static str]) {
        // local time is rendered by the node itself; the rule is informational
        info!("SNTP configured for {} servers (TZ {})", servers.len(), posix_tz);
        SERVERS.signal(servers);
    }
}

/// Background SNTP loop; waits for the first [`SntpService::configure`]
pub async fn run(stack: Stack<'static>, config: SntpConfig) -> ! {
    let client = SntpClient::with_config(config);
    let mut servers = SERVERS.wait().await;

    loop {
        stack.wait_config_up().await;
        match client.sync(&stack, servers).await {
            Ok(ts) => info!(
                "SNTP sync successful: {}.{:06} UTC",
                ts.unix_secs, ts.micros
            ),
            Err(e) => warn!("SNTP sync failed: {:?}", e),
        }

        let resync = Timer::after(Duration::from_secs(client.config.resync_interval_secs));
        if let Either::Second(update) = select(resync, SERVERS.wait()).await {
            info!("SNTP server list replaced");
            servers = update;
        }
    }
}

/// SNTP client for time synchronization
pub struct SntpClient {
    config: SntpConfig,
}

impl SntpClient {
    pub fn with_config(config: SntpConfig) -> Self {
        Self { config }
    }

    /// Query `servers` in order until one answers, then calibrate the
    /// wall clock
    pub async fn sync(
        &self,
        stack: &Stack<'static>,
        servers: &[&str],
    ) -> Result<Timestamp, NetworkError> {
        info!("Starting SNTP synchronization");
        for server in servers {
            for attempt in 0..self.config.retry_count {
                info!(
                    "Attempting SNTP sync with {} (attempt {})",
                    server,
                    attempt + 1
                );
                match self.sntp_request(stack, server).await {
                    Ok(timestamp) => {
                        match u32::try_from(timestamp.unix_secs) {
                            Ok(secs) => CcmWallClock::calibrate(secs, timestamp.micros),
                            Err(_) => return Err(NetworkError::InvalidResponse),
                        }
                        return Ok(timestamp);
                    }
                    Err(e) => {
                        warn!("SNTP sync failed: {:?}, retrying...", e);
                        Timer::after_millis(self.config.retry_delay_ms).await;
                    }
                }
            }
        }
        error!("All SNTP sync attempts failed");
        Err(NetworkError::AllServersFailed)
    }

    async fn sntp_request(
        &self,
        stack: &Stack<'static>,
        server: &str,
    ) -> Result<Timestamp, NetworkError> {
        let server_endpoint = manager::resolve(*stack, server, NTP_PORT).await?;

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            *stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| NetworkError::SocketError)?;

        // NTP request: LI=0, VN=3, Mode=3 (Client)
        let mut ntp_packet = [0u8; NTP_PACKET_LEN];
        ntp_packet[0] = 0x1B;
        let transmit_time = Instant::now();
        socket
            .send_to(&ntp_packet, server_endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)?;

        let mut response = [0u8; NTP_PACKET_LEN];
        let timeout_future = Timer::after(Duration::from_millis(self.config.timeout_ms));
        let recv_future = socket.recv_from(&mut response);
        let (recv_len, from_addr) = match select(timeout_future, recv_future).await {
            Either::First(_) => return Err(NetworkError::Timeout),
            Either::Second(result) => result.map_err(|_| NetworkError::SocketError)?,
        };
        let receive_time = Instant::now();

        info!(
            "Received {} bytes from {}",
            recv_len,
            Debug2Format(&from_addr)
        );

        if recv_len < NTP_PACKET_LEN || from_addr.endpoint.addr != server_endpoint.addr {
            return Err(NetworkError::InvalidResponse);
        }

        let stratum = response[1];
        if stratum == 0 || stratum > self.config.max_stratum {
            warn!(
                "Invalid stratum {} (max {})",
                stratum, self.config.max_stratum
            );
            return Err(NetworkError::ServerError);
        }

        let tx_timestamp_secs =
            u32::from_be_bytes([response[40], response[41], response[42], response[43]]) as u64;
        let tx_timestamp_frac =
            u32::from_be_bytes([response[44], response[45], response[46], response[47]]);

        let rtt = receive_time.duration_since(transmit_time);
        let rtt_correction_micros = rtt.as_micros() / 2;

        let mut timestamp = Timestamp::from_ntp(tx_timestamp_secs, tx_timestamp_frac);
        let micros = u64::from(timestamp.micros) + rtt_correction_micros;
        timestamp.unix_secs += micros / 1_000_000;
        timestamp.micros = (micros % 1_000_000) as u32;

        info!(
            "NTP timestamp: {}.{:06} UTC (stratum {}, RTT correction: {} µs)",
            timestamp.unix_secs, timestamp.micros, stratum, rtt_correction_micros
        );
        Ok(timestamp)
    }
}
