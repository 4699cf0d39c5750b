#![deny(unsafe_code)]
#![deny(warnings)]
//! PM sensor serial input
//!
//! The UART receives through a DMA ring buffer; [`pump`] moves bytes into a
//! 1024-byte pipe, and [`PmsSerial`] reads that pipe as a
//! [`ByteSource`]. When the pipe overflows the backlog is discarded so the
//! freshest bytes survive; the frame decoder drops stale input anyway.

use airnode_hal::ByteSource;
use defmt::{debug, warn};
use embassy_stm32::usart::RingBufferedUartRx;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_time::{with_deadline, Duration, Instant};

pub const PIPE_CAPACITY: usize = 1024;

/// DMA ring buffer length
pub const DMA_BUFFER_LEN: usize = 256;

static PMS_PIPE: Pipe<CriticalSectionRawMutex, PIPE_CAPACITY> = Pipe::new();

/// Move received bytes from the UART into the pipe, forever
pub async fn pump(mut rx: RingBufferedUartRx<'static>) -> ! {
    let mut chunk = [0u8; 64];
    loop {
        match rx.read(&mut chunk).await {
            Ok(0) => {}
            Ok(n) => push(&chunk[..n]),
            // the ring buffer restarts itself on the next read
            Err(e) => warn!("PMS UART error: {:?}", e),
        }
    }
}

fn push(bytes: &[u8]) {
    if PMS_PIPE.free_capacity() < bytes.len() {
        debug!("PMS backlog full, dropping {} stale bytes", PMS_PIPE.len());
        PMS_PIPE.clear();
    }
    // `bytes` is at most one chunk, which now fits
    let _ = PMS_PIPE.try_write(bytes);
}

/// Reader side of the PM sensor pipe
#[derive(Clone, Copy, Default)]
pub struct PmsSerial;

impl PmsSerial {
    /// Drop everything received so far
    pub fn flush(&mut self) {
        PMS_PIPE.clear();
    }
}

impl ByteSource for PmsSerial {
    fn available(&mut self) -> usize {
        PMS_PIPE.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match PMS_PIPE.try_read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    async fn read_exact_timeout(&mut self, buf: &mut [u8], timeout_ms: u32) -> usize {
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
        let mut filled = 0;
        while filled < buf.len() {
            match with_deadline(deadline, PMS_PIPE.read(&mut buf[filled..])).await {
                Ok(n) => filled += n,
                Err(_) => break,
            }
        }
        filled
    }
}
