#![deny(unsafe_code)]
#![deny(warnings)]
//! TLS 1.3 transport using embedded-tls
//!
//! Implements [`SecureTransport`] over the W5500 stack: DNS, TCP, then a
//! TLS 1.3 handshake with the hardware RNG.
//!
//! # Prototype limitations
//!
//! - Certificate verification is disabled (`NoVerify`)
//! - One open connection at a time (shared static TLS buffers)
//!
//! # Memory Usage
//!
//! - TLS read buffer: 18 KB in main SRAM (see `src/tls_buffers.rs`)
//! - TLS write buffer: 16 KB in main SRAM (see `src/tls_buffers.rs`)
//! - TCP socket buffers: 8 KB per transport (4 KB RX + 4 KB TX)

use core::cell::RefCell;

use airnode_hal::SecureTransport;
use defmt::{debug, error, info, warn, Debug2Format};
use embassy_net::Stack;
use embassy_stm32::peripherals;
use embassy_stm32::rng::Rng;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{ErrorType, Read, Write};
use embedded_tls::{
    Aes128GcmSha256, CryptoProvider, NoVerify, TlsConfig, TlsConnection, TlsContext, TlsVerifier,
};
use rand_core::RngCore;

use crate::tls_buffers::{self, TlsBufferClaim};

use super::error::NetworkError;
use super::manager;
use super::socket::AsyncTcpSocket;

/// TCP socket buffer size, per direction
pub const TCP_BUFFER_SIZE: usize = 4096;

/// Hardware RNG behind a critical-section mutex
pub type SharedRngCell = Mutex<CriticalSectionRawMutex, RefCell<Rng<'static, peripherals::RNG>>>;

/// Handle to the hardware RNG that every transport can hold
#[derive(Clone, Copy)]
pub struct SharedRng {
    cell: &'static SharedRngCell,
}

impl SharedRng {
    pub fn new(cell: &'static SharedRngCell) -> Self {
        Self { cell }
    }
}

impl rand_core::RngCore for SharedRng {
    fn next_u32(&mut self) -> u32 {
        self.cell.lock(|rng| rng.borrow_mut().next_u32())
    }

    fn next_u64(&mut self) -> u64 {
        self.cell.lock(|rng| rng.borrow_mut().next_u64())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.cell.lock(|rng| rng.borrow_mut().fill_bytes(dest))
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl rand_core::CryptoRng for SharedRng {}

/// Simple crypto provider that wraps an RNG for TLS operations
struct SimpleCryptoProvider<RNG> {
    rng: RNG,
    verifier: NoVerify,
}

impl<RNG> SimpleCryptoProvider<RNG> {
    fn new(rng: RNG) -> Self {
        Self {
            rng,
            verifier: NoVerify,
        }
    }
}

impl<RNG> CryptoProvider for SimpleCryptoProvider<RNG>
where
    RNG: rand_core::CryptoRngCore,
{
    type CipherSuite = Aes128GcmSha256;
    type Signature = &'static [u8];

    fn rng(&mut self) -> impl rand_core::CryptoRngCore {
        &mut self.rng
    }

    fn verifier(
        &mut self,
    ) -> Result<&mut impl TlsVerifier<Self::CipherSuite>, embedded_tls::TlsError> {
        Ok(&mut self.verifier)
    }
}

/// TCP socket buffers owned by one transport
pub struct TcpBuffers {
    rx: [u8; TCP_BUFFER_SIZE],
    tx: [u8; TCP_BUFFER_SIZE],
}

impl TcpBuffers {
    pub const fn new() -> Self {
        Self {
            rx: [0; TCP_BUFFER_SIZE],
            tx: [0; TCP_BUFFER_SIZE],
        }
    }
}

/// TLS 1.3 client transport
pub struct TlsTransport {
    stack: Stack<'static>,
    rng: SharedRng,
    buffers: &'static mut TcpBuffers,
    timeout: Duration,
}

impl TlsTransport {
    /// * `timeout` - bound on DNS + TCP connect + handshake, and the socket
    ///   inactivity timeout afterwards
    pub fn new(
        stack: Stack<'static>,
        rng: SharedRng,
        buffers: &'static mut TcpBuffers,
        timeout: Duration,
    ) -> Self {
        Self {
            stack,
            rng,
            buffers,
            timeout,
        }
    }

    async fn open<'a>(&'a mut self, host: &str, port: u16) -> Result<TlsStream<'a>, NetworkError> {
        let endpoint = manager::resolve(self.stack, host, port).await?;

        let mut socket =
            AsyncTcpSocket::new(self.stack, &mut self.buffers.rx, &mut self.buffers.tx);
        socket.set_timeout(Some(self.timeout));
        socket.connect(endpoint).await?;
        info!("TCP connection established to {}", Debug2Format(&endpoint));

        let Some((claim, read_buf, write_buf)) = tls_buffers::claim() else {
            error!("TLS buffers held by another connection");
            socket.close();
            return Err(NetworkError::TlsBuffersBusy);
        };
        debug!(
            "TLS buffers claimed: read={} bytes, write={} bytes",
            read_buf.len(),
            write_buf.len()
        );

        let config = TlsConfig::new().with_server_name(host);
        let mut connection =
            TlsConnection::<AsyncTcpSocket, Aes128GcmSha256>::new(socket, read_buf, write_buf);

        let provider = SimpleCryptoProvider::new(self.rng);
        connection
            .open(TlsContext::new(&config, provider))
            .await
            .map_err(|e| {
                error!("TLS handshake with {} failed: {:?}", host, Debug2Format(&e));
                NetworkError::TlsHandshakeFailed
            })?;

        info!("TLS 1.3 handshake with {} completed", host);
        Ok(TlsStream {
            connection,
            _claim: claim,
        })
    }
}

impl SecureTransport for TlsTransport {
    type Error = NetworkError;
    type Connection<'a>
        = TlsStream<'a>
    where
        Self: 'a;

    async fn connect<'a>(&'a mut self, host: &str, port: u16) -> Result<TlsStream<'a>, NetworkError> {
        let timeout = self.timeout;
        with_timeout(timeout, self.open(host, port))
            .await
            .map_err(|_| {
                warn!("Connecting to {}:{} timed out", host, port);
                NetworkError::Timeout
            })?
    }
}

/// An open TLS connection; the TLS buffers are released when it drops
pub struct TlsStream<'a> {
    // declared first so it drops before the claim
    connection: TlsConnection<'a, AsyncTcpSocket<'a>, Aes128GcmSha256>,
    _claim: TlsBufferClaim,
}

impl TlsStream<'_> {
    /// Send close_notify and close the socket
    pub async fn close(self) {
        let TlsStream { connection, _claim } = self;
        match connection.close().await {
            Ok(mut socket) => socket.close(),
            Err((mut socket, e)) => {
                debug!("TLS close returned error: {:?}", Debug2Format(&e));
                socket.close();
            }
        }
    }
}

impl ErrorType for TlsStream<'_> {
    type Error = NetworkError;
}

impl Read for TlsStream<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetworkError> {
        match self.connection.read(buf).await {
            Ok(n) => Ok(n),
            // peer sent close_notify: end of stream
            Err(embedded_tls::TlsError::ConnectionClosed) => Ok(0),
            Err(e) => {
                warn!("TLS read failed: {:?}", Debug2Format(&e));
                Err(NetworkError::TlsIoError)
            }
        }
    }
}

impl Write for TlsStream<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, NetworkError> {
        self.connection.write(buf).await.map_err(|e| {
            warn!("TLS write failed: {:?}", Debug2Format(&e));
            NetworkError::TlsIoError
        })
    }

    async fn flush(&mut self) -> Result<(), NetworkError> {
        self.connection.flush().await.map_err(|e| {
            warn!("TLS flush failed: {:?}", Debug2Format(&e));
            NetworkError::TlsIoError
        })
    }
}
