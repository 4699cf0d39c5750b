#![deny(unsafe_code)]
#![deny(warnings)]
//! Device identifier utilities for STM32F405
//!
//! The factory-programmed 96-bit unique device ID is stable across reboots
//! and unique to each chip, so it names the node in the upload path.

use heapless::String;

/// Hex characters in the 96-bit UID
const UID_HEX_LEN: usize = 24;

/// Longest board id: a prefix of up to 15 characters, `-`, the UID
pub const BOARD_ID_MAX_LEN: usize = 40;

pub type BoardId = String<BOARD_ID_MAX_LEN>;

/// Get the STM32F405 unique device ID as a 24-character hex string
pub fn uid_hex() -> &'static str {
    embassy_stm32::uid::uid_hex()
}

/// Board id in the format `{prefix}-{24_hex_chars}`
///
/// A prefix too long to fit leaves just the UID.
pub fn board_id(prefix: &str) -> BoardId {
    let uid = uid_hex();
    let mut id = BoardId::new();

    if prefix.len() + 1 + UID_HEX_LEN <= BOARD_ID_MAX_LEN
        && id.push_str(prefix).is_ok()
        && id.push('-').is_ok()
        && id.push_str(uid).is_ok()
    {
        return id;
    }

    id.clear();
    // the UID always fits
    let _ = id.push_str(uid);
    id
}
