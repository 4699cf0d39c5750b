//! Fixed-offset local time

use core::fmt::Write;

use heapless::String;

use super::calendar::CivilDateTime;

/// Capacity of an [`IsoTimestamp`]
pub const ISO_TIMESTAMP_CAPACITY: usize = 24;

/// Local time rendered as `YYYY-MM-DDTHH:MM:SS`
pub type IsoTimestamp = String<ISO_TIMESTAMP_CAPACITY>;

/// A time zone without daylight saving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedZone {
    /// Abbreviation, e.g. `"COT"`
    pub name: &'static str,
    /// Offset east of UTC in seconds
    pub offset_secs: i32,
    /// The same rule in POSIX `TZ` syntax (offset sign inverted)
    pub posix: &'static str,
}

impl FixedZone {
    /// Colombia, UTC−5 all year
    pub const COLOMBIA: Self = Self {
        name: "COT",
        offset_secs: -5 * 3600,
        posix: "COT5",
    };

    pub const UTC: Self = Self {
        name: "UTC",
        offset_secs: 0,
        posix: "UTC0",
    };

    /// Local broken-down time for an epoch
    pub fn to_local(&self, epoch_secs: i64) -> CivilDateTime {
        CivilDateTime::from_epoch(epoch_secs + i64::from(self.offset_secs))
    }

    /// Local time formatted as `YYYY-MM-DDTHH:MM:SS`
    pub fn render_iso(&self, epoch_secs: i64) -> Option<IsoTimestamp> {
        let t = self.to_local(epoch_secs);
        let mut out = IsoTimestamp::new();
        write!(
            out,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            t.year, t.month, t.day, t.hour, t.minute, t.second
        )
        .ok()?;
        Some(out)
    }
}

impl Default for FixedZone {
    fn default() -> Self {
        Self::COLOMBIA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_rule_matches_offset() {
        for zone in [FixedZone::COLOMBIA, FixedZone::UTC] {
            let hours = -zone.offset_secs / 3600;
            assert_eq!(zone.posix, format!("{}{}", zone.name, hours));
        }
    }

    #[test]
    fn test_render_colombia_local_time() {
        // 2023-08-15T10:20:30Z is 05:20:30 in Bogotá
        let iso = FixedZone::COLOMBIA.render_iso(1_692_094_830).unwrap();
        assert_eq!(iso.as_str(), "2023-08-15T05:20:30");
    }

    #[test]
    fn test_render_crosses_midnight() {
        // 2023-01-01T03:00:00Z is still New Year's Eve locally
        let iso = FixedZone::COLOMBIA.render_iso(1_672_542_000).unwrap();
        assert_eq!(iso.as_str(), "2022-12-31T22:00:00");
    }
}
