//! PMS5003-class particulate matter frame decoder
//!
//! The sensor streams 32-byte frames at 9600 baud without any flow control:
//!
//! ```text
//! offset  0   1   2..3   4..9          10..15         16..29    30..31
//!        0x42 0x4D len=28 PM1/2.5/10   PM1/2.5/10     counts,   checksum
//!                          CF=1         environmental  reserved  (sum 0..29)
//! ```
//!
//! All multi-byte fields are big-endian. Decoding recovers alignment from an
//! arbitrary position in the stream by hunting for the sync word, then
//! validates length and checksum before trusting any field.

use airnode_hal::{ByteSource, Monotonic};

use crate::config::FrameConfig;
use crate::error::DecodeError;

/// Full frame length in bytes, sync word included
pub const FRAME_LEN: usize = 32;

/// Frame start marker
pub const SYNC_WORD: [u8; 2] = [0x42, 0x4D];

/// Value of the length field (bytes following it)
const DATA_LEN: u16 = 28;

const CF1_OFFSET: usize = 4;
const ENVIRONMENTAL_OFFSET: usize = 10;
const CHECKSUM_OFFSET: usize = 30;

/// PM mass concentrations [µg/m³]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParticulateReading {
    /// PM1.0
    pub pm1_0: u16,
    /// PM2.5
    pub pm2_5: u16,
    /// PM10
    pub pm10: u16,
}

impl ParticulateReading {
    pub const fn new(pm1_0: u16, pm2_5: u16, pm10: u16) -> Self {
        Self {
            pm1_0,
            pm2_5,
            pm10,
        }
    }

    /// All three concentrations are zero
    pub fn is_zero(&self) -> bool {
        self.pm1_0 == 0 && self.pm2_5 == 0 && self.pm10 == 0
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            pm1_0: u16::from_be_bytes([bytes[0], bytes[1]]),
            pm2_5: u16::from_be_bytes([bytes[2], bytes[3]]),
            pm10: u16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }
}

/// A structurally valid frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticulateFrame {
    cf1: ParticulateReading,
    environmental: ParticulateReading,
}

impl ParticulateFrame {
    /// Validate sync word, length field and checksum of a complete frame
    pub fn parse(bytes: &[u8; FRAME_LEN]) -> Result<Self, DecodeError> {
        if bytes[..2] != SYNC_WORD {
            return Err(DecodeError::BadSync);
        }

        let data_len = u16::from_be_bytes([bytes[2], bytes[3]]);
        if data_len != DATA_LEN {
            return Err(DecodeError::BadLength);
        }

        let expected = u16::from_be_bytes([bytes[CHECKSUM_OFFSET], bytes[CHECKSUM_OFFSET + 1]]);
        if checksum(&bytes[..CHECKSUM_OFFSET]) != expected {
            return Err(DecodeError::BadChecksum);
        }

        Ok(Self {
            cf1: ParticulateReading::from_bytes(&bytes[CF1_OFFSET..CF1_OFFSET + 6]),
            environmental: ParticulateReading::from_bytes(
                &bytes[ENVIRONMENTAL_OFFSET..ENVIRONMENTAL_OFFSET + 6],
            ),
        })
    }

    /// Concentrations under "standard particle" (CF=1) calibration
    pub fn cf1(&self) -> ParticulateReading {
        self.cf1
    }

    /// Concentrations under atmospheric environment
    pub fn environmental(&self) -> ParticulateReading {
        self.environmental
    }

    /// Pick the reading to report
    ///
    /// An all-zero group means the sensor has not populated it on this frame.
    /// Environmental is preferred, CF=1 is the fallback.
    pub fn reading(&self) -> Result<ParticulateReading, DecodeError> {
        if !self.environmental.is_zero() {
            Ok(self.environmental)
        } else if !self.cf1.is_zero() {
            Ok(self.cf1)
        } else {
            Err(DecodeError::AllZero)
        }
    }
}

/// 16-bit wrapping byte sum
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// Stream-level frame decoder
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    config: FrameConfig,
}

impl FrameDecoder {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    /// Read and validate one frame from `stream`
    ///
    /// Discards stale input above the drain threshold, hunts for the sync
    /// word until the configured deadline on `clock`, then reads the body.
    /// Only bytes up to the end of the returned frame are consumed.
    pub async fn decode<S, M>(
        &self,
        stream: &mut S,
        clock: &M,
    ) -> Result<ParticulateReading, DecodeError>
    where
        S: ByteSource,
        M: Monotonic,
    {
        let dropped = self.drain(stream);
        if dropped > 0 {
            debug!("PM stream backlog: dropped {} stale bytes", dropped);
        }

        self.find_sync(stream, clock).await?;

        let mut frame = [0u8; FRAME_LEN];
        frame[..2].copy_from_slice(&SYNC_WORD);
        let body = &mut frame[2..];
        let received = stream
            .read_exact_timeout(body, self.config.body_timeout_ms)
            .await;
        if received != FRAME_LEN - 2 {
            warn!("PM frame truncated: {} of {} body bytes", received, FRAME_LEN - 2);
            return Err(DecodeError::Truncated);
        }

        ParticulateFrame::parse(&frame)?.reading()
    }

    /// Discard bytes while more than `drain_threshold` are buffered
    fn drain<S: ByteSource>(&self, stream: &mut S) -> usize {
        let mut dropped = 0;
        while stream.available() > self.config.drain_threshold {
            if stream.read_byte().is_none() {
                break;
            }
            dropped += 1;
        }
        dropped
    }

    /// Consume bytes up to and including the next sync word
    async fn find_sync<S, M>(&self, stream: &mut S, clock: &M) -> Result<(), DecodeError>
    where
        S: ByteSource,
        M: Monotonic,
    {
        let deadline = clock.now_ms().saturating_add(self.config.sync_timeout_ms);
        let mut have_first = false;

        loop {
            let now = clock.now_ms();
            if now >= deadline {
                return Err(DecodeError::Timeout);
            }
            let byte = match stream.read_byte() {
                Some(byte) => byte,
                None => {
                    // nothing buffered: park on the source until a byte or the deadline
                    let wait_ms = u32::try_from(deadline - now).unwrap_or(u32::MAX);
                    let mut one = [0u8; 1];
                    if stream.read_exact_timeout(&mut one, wait_ms).await == 0 {
                        continue;
                    }
                    one[0]
                }
            };
            if have_first && byte == SYNC_WORD[1] {
                return Ok(());
            }
            // A repeated 0x42 keeps the tentative match alive
            have_first = byte == SYNC_WORD[0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSerial, StepClock};
    use embassy_futures::block_on;

    /// Build a valid frame with the given CF=1 and environmental triples
    fn frame(cf1: [u16; 3], env: [u16; 3]) -> [u8; FRAME_LEN] {
        let mut f = [0u8; FRAME_LEN];
        f[..2].copy_from_slice(&SYNC_WORD);
        f[2..4].copy_from_slice(&DATA_LEN.to_be_bytes());
        for (i, v) in cf1.iter().enumerate() {
            f[CF1_OFFSET + 2 * i..CF1_OFFSET + 2 * i + 2].copy_from_slice(&v.to_be_bytes());
        }
        for (i, v) in env.iter().enumerate() {
            let at = ENVIRONMENTAL_OFFSET + 2 * i;
            f[at..at + 2].copy_from_slice(&v.to_be_bytes());
        }
        // particle counts, so the checksum covers more than the PM fields
        f[16] = 0x03;
        f[17] = 0xE8;
        let sum = checksum(&f[..CHECKSUM_OFFSET]);
        f[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_be_bytes());
        f
    }

    fn decode(serial: &mut FakeSerial) -> Result<ParticulateReading, DecodeError> {
        let clock = StepClock::new(1);
        block_on(FrameDecoder::default().decode(serial, &clock))
    }

    #[test]
    fn test_prefers_environmental_fields() {
        let mut serial = FakeSerial::new(&frame([11, 22, 33], [5, 9, 12]));
        assert_eq!(decode(&mut serial), Ok(ParticulateReading::new(5, 9, 12)));
    }

    #[test]
    fn test_environmental_used_when_partially_zero() {
        let mut serial = FakeSerial::new(&frame([11, 22, 33], [0, 0, 4]));
        assert_eq!(decode(&mut serial), Ok(ParticulateReading::new(0, 0, 4)));
    }

    #[test]
    fn test_falls_back_to_cf1_fields() {
        let mut serial = FakeSerial::new(&frame([11, 22, 33], [0, 0, 0]));
        assert_eq!(decode(&mut serial), Ok(ParticulateReading::new(11, 22, 33)));
    }

    #[test]
    fn test_all_zero_frame_rejected() {
        let mut serial = FakeSerial::new(&frame([0, 0, 0], [0, 0, 0]));
        assert_eq!(decode(&mut serial), Err(DecodeError::AllZero));
    }

    #[test]
    fn test_checksum_single_bit_corruption() {
        let good = frame([1, 2, 3], [4, 5, 6]);
        for bit in 0..16 {
            let mut bad = good;
            bad[CHECKSUM_OFFSET + bit / 8] ^= 0x80 >> (bit % 8);
            let mut serial = FakeSerial::new(&bad);
            assert_eq!(decode(&mut serial), Err(DecodeError::BadChecksum), "bit {}", bit);
        }
    }

    #[test]
    fn test_bad_length_rejected() {
        let mut f = frame([1, 2, 3], [4, 5, 6]);
        f[3] = 20;
        let sum = checksum(&f[..CHECKSUM_OFFSET]);
        f[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_be_bytes());
        let mut serial = FakeSerial::new(&f);
        assert_eq!(decode(&mut serial), Err(DecodeError::BadLength));
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut bytes = vec![0x00, 0x42, 0x13, 0x4D, 0xFF, 0x42];
        bytes.extend_from_slice(&frame([1, 1, 1], [7, 8, 9]));
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let mut serial = FakeSerial::new(&bytes);

        assert_eq!(decode(&mut serial), Ok(ParticulateReading::new(7, 8, 9)));
        assert_eq!(serial.remaining(), vec![0xAA, 0xBB]);
    }

    #[test]
    fn test_truncated_body() {
        let f = frame([1, 2, 3], [4, 5, 6]);
        let mut serial = FakeSerial::new(&f[..20]);
        assert_eq!(decode(&mut serial), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_timeout_without_sync_word() {
        let config = FrameConfig::default();
        let clock = StepClock::new(1);
        let mut serial = FakeSerial::endless(0x55);

        let result = block_on(FrameDecoder::new(config.clone()).decode(&mut serial, &clock));
        assert_eq!(result, Err(DecodeError::Timeout));
        // Deadline check happens before every read: no read at or past the deadline
        assert!(serial.reads() < config.sync_timeout_ms as usize);
        assert!(clock.peek() <= config.sync_timeout_ms + 1);
    }

    #[test]
    fn test_timeout_on_silent_stream() {
        let clock = StepClock::new(1000);
        let mut serial = FakeSerial::new(&[]);
        let result = block_on(FrameDecoder::default().decode(&mut serial, &clock));
        assert_eq!(result, Err(DecodeError::Timeout));
        // each idle wait is bounded by what is left of the deadline
        assert_eq!(serial.waits(), [2000, 1000]);
    }

    #[test]
    fn test_sync_word_arriving_while_waiting() {
        let mut serial = FakeSerial::arriving(&frame([1, 2, 3], [4, 5, 6]));
        assert_eq!(decode(&mut serial), Ok(ParticulateReading::new(4, 5, 6)));
        assert_eq!(serial.reads(), 0);
    }

    #[test]
    fn test_backlog_drained_before_sync() {
        let stale = frame([1, 1, 1], [2, 2, 2]);
        let mut bytes = Vec::new();
        for _ in 0..10 {
            bytes.extend_from_slice(&stale);
        }
        let fresh = frame([3, 3, 3], [4, 4, 4]);
        bytes.extend_from_slice(&fresh);
        let mut serial = FakeSerial::new(&bytes);

        // 352 bytes buffered: the drain leaves 200, starting 24 bytes into
        // the fifth frame, so the sixth frame is the first complete one
        assert_eq!(decode(&mut serial), Ok(ParticulateReading::new(2, 2, 2)));
        assert_eq!(serial.remaining().len(), 200 - 8 - FRAME_LEN);
    }

    #[test]
    fn test_parse_rejects_missing_sync() {
        let mut f = frame([1, 2, 3], [4, 5, 6]);
        f[0] = 0x00;
        assert_eq!(ParticulateFrame::parse(&f), Err(DecodeError::BadSync));
    }

    #[test]
    fn test_parse_exposes_both_groups() {
        let parsed = ParticulateFrame::parse(&frame([1, 2, 3], [4, 5, 6])).unwrap();
        assert_eq!(parsed.cf1(), ParticulateReading::new(1, 2, 3));
        assert_eq!(parsed.environmental(), ParticulateReading::new(4, 5, 6));
    }
}
