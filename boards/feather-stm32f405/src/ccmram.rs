//! CCM RAM Memory Allocations Module
//!
//! This module is the **ONLY** place in the firmware where CCM RAM
//! (Core-Coupled Memory) section attributes are used. All
//! `#[link_section = ".ccmram"]` attributes must live here.
//!
//! # CCM RAM Characteristics (STM32F405RG)
//!
//! - **Size**: 64 KB (0x1000_0000 - 0x1000_FFFF)
//! - **Access**: CPU only (no DMA access)
//! - **Performance**: Zero wait states
//!
//! # Current Allocations
//!
//! - Wall-clock calibration (~13 bytes): Unix time and the TIM2 monotonic
//!   reading captured at the same instant.
//!
//! # Wall-clock model
//!
//! Like Linux `CLOCK_REALTIME`: the wall clock is the monotonic clock plus
//! an offset captured at calibration (SNTP answer or HTTP `Date:` header).
//!
//! ARMv7-M has no 64-bit atomics, so the 64-bit monotonic reading is split
//! into two words and every multi-word access happens inside a critical
//! section.

// The #[link_section] attribute is considered unsafe.
#![allow(unsafe_code)]
#![deny(warnings)]

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const MICROS_PER_SEC: u64 = 1_000_000;

/// Set once the wall clock has been calibrated
#[link_section = ".ccmram"]
static CALIBRATED: AtomicBool = AtomicBool::new(false);

/// Unix seconds at calibration. u32 lasts until 2106.
#[link_section = ".ccmram"]
static BASE_UNIX_SECS: AtomicU32 = AtomicU32::new(0);

/// Microseconds within the second at calibration (0-999999)
#[link_section = ".ccmram"]
static BASE_UNIX_MICROS: AtomicU32 = AtomicU32::new(0);

/// Monotonic microseconds at calibration, high word
#[link_section = ".ccmram"]
static BASE_MONO_HI: AtomicU32 = AtomicU32::new(0);

/// Monotonic microseconds at calibration, low word
#[link_section = ".ccmram"]
static BASE_MONO_LO: AtomicU32 = AtomicU32::new(0);

/// Calibrate the wall clock
///
/// * `unix_secs` / `unix_micros` - the current Unix time
/// * `mono_micros` - TIM2 monotonic ticks (µs) at the same instant
pub fn calibrate_wallclock(unix_secs: u32, unix_micros: u32, mono_micros: u64) {
    critical_section::with(|_| {
        BASE_UNIX_SECS.store(unix_secs, Ordering::Relaxed);
        BASE_UNIX_MICROS.store(unix_micros % MICROS_PER_SEC as u32, Ordering::Relaxed);
        BASE_MONO_HI.store((mono_micros >> 32) as u32, Ordering::Relaxed);
        BASE_MONO_LO.store(mono_micros as u32, Ordering::Relaxed);
        CALIBRATED.store(true, Ordering::Release);
    });
}

/// Current Unix time as (seconds, microseconds), `None` until calibrated
pub fn now_unix_time(current_mono_micros: u64) -> Option<(u64, u32)> {
    let (base_secs, base_micros, base_mono) = critical_section::with(|_| {
        if !CALIBRATED.load(Ordering::Acquire) {
            return None;
        }
        let mono = (u64::from(BASE_MONO_HI.load(Ordering::Relaxed)) << 32)
            | u64::from(BASE_MONO_LO.load(Ordering::Relaxed));
        Some((
            BASE_UNIX_SECS.load(Ordering::Relaxed),
            BASE_UNIX_MICROS.load(Ordering::Relaxed),
            mono,
        ))
    })?;

    let elapsed = current_mono_micros.saturating_sub(base_mono);
    let total_micros = u64::from(base_micros) + elapsed % MICROS_PER_SEC;
    let secs = u64::from(base_secs) + elapsed / MICROS_PER_SEC + total_micros / MICROS_PER_SEC;

    Some((secs, (total_micros % MICROS_PER_SEC) as u32))
}
