//! Serial receive path abstraction

use core::future::Future;

/// Buffered byte source fed by a UART
///
/// The board keeps receiving in the background; this trait only exposes the
/// receive buffer. Nothing here transmits.
pub trait ByteSource {
    /// Number of bytes currently buffered and readable without waiting
    fn available(&mut self) -> usize;

    /// Take one buffered byte, or `None` if the buffer is empty
    ///
    /// Never waits.
    fn read_byte(&mut self) -> Option<u8>;

    /// Fill `buf`, waiting at most `timeout_ms` for the remainder
    ///
    /// Returns the number of bytes actually written into `buf`. A short count
    /// means the timeout expired or the source closed.
    fn read_exact_timeout(
        &mut self,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> impl Future<Output = usize>;
}
