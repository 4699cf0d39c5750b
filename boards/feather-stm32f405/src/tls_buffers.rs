//! TLS Buffer Allocations in Main SRAM
//!
//! One read/write buffer pair for TLS records, shared by every TLS
//! connection the firmware opens (HTTP `Date:` fallback, uploads). The
//! node runs one request at a time, so a single pair is enough; an in-use
//! flag turns an accidental second connection into an error instead of
//! aliasing.
//!
//! TLS buffers are placed in main SRAM (128KB available) rather than CCM RAM
//! (64KB): TLS 1.3 needs a 17KB+ read buffer and CCM RAM holds the
//! timing-sensitive variables.
//!
//! # Buffer Sizing
//!
//! **Read Buffer (18 KB)**:
//! - TLS 1.3 maximum plaintext: 16384 bytes (16 KB)
//! - TLS record header: 5 bytes
//! - AEAD authentication tag: 16 bytes (AES-128-GCM-SHA256)
//! - Padding allowance: ~512 bytes
//!
//! **Write Buffer (16 KB)**: we control outgoing record sizes.

#![allow(unsafe_code)] // Required for static mut buffers
#![deny(warnings)]

use core::sync::atomic::{AtomicBool, Ordering};

/// TLS read buffer size: 18 KB
const TLS_READ_BUF_SIZE: usize = 18 * 1024;

/// TLS write buffer size: 16 KB
const TLS_WRITE_BUF_SIZE: usize = 16 * 1024;

static mut TLS_READ_BUF: [u8; TLS_READ_BUF_SIZE] = [0; TLS_READ_BUF_SIZE];

static mut TLS_WRITE_BUF: [u8; TLS_WRITE_BUF_SIZE] = [0; TLS_WRITE_BUF_SIZE];

/// Set while a [`TlsBufferClaim`] is alive
static IN_USE: AtomicBool = AtomicBool::new(false);

/// Proof of exclusive use of the TLS buffers; releases them on drop
///
/// The slices handed out by [`claim`] must not outlive it.
pub struct TlsBufferClaim {
    _private: (),
}

impl Drop for TlsBufferClaim {
    fn drop(&mut self) {
        IN_USE.store(false, Ordering::Release);
    }
}

/// Take the TLS buffers, `None` while another connection holds them
///
/// Returns `(claim, read_buffer, write_buffer)`.
pub fn claim() -> Option<(TlsBufferClaim, &'static mut [u8], &'static mut [u8])> {
    if IN_USE.swap(true, Ordering::AcqRel) {
        return None;
    }

    // SAFETY: IN_USE was false, so no other claim exists and no other
    // reference to the buffers is live. It stays set until the claim drops.
    let (read, write) = unsafe {
        (
            &mut *core::ptr::addr_of_mut!(TLS_READ_BUF),
            &mut *core::ptr::addr_of_mut!(TLS_WRITE_BUF),
        )
    };

    Some((TlsBufferClaim { _private: () }, read, write))
}
