//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's `civil_from_days` and `days_from_civil`.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! Works on signed day counts, so dates before 1970 convert too, and never
//! iterates over years.

const SECONDS_PER_DAY: i64 = 86_400;

/// Days from 0000-03-01 to 1970-01-01
const EPOCH_SHIFT: i64 = 719_468;

/// Broken-down proleptic Gregorian date and time, no time zone attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CivilDateTime {
    pub year: i32,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilDateTime {
    /// Break down seconds since the Unix epoch
    pub fn from_epoch(epoch_secs: i64) -> Self {
        let days = epoch_secs.div_euclid(SECONDS_PER_DAY);
        let secs_today = epoch_secs.rem_euclid(SECONDS_PER_DAY);
        let (year, month, day) = civil_from_days(days);

        Self {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
        }
    }

    /// Seconds since the Unix epoch
    ///
    /// Fields are taken as given; a leap second (`second == 60`) lands on
    /// the first second of the next minute.
    pub fn to_epoch(&self) -> i64 {
        days_from_civil(self.year, self.month, self.day) * SECONDS_PER_DAY
            + i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.second)
    }
}

/// Gregorian leap year rule
///
/// - 2000: leap (divisible by 400)
/// - 1900: not leap (divisible by 100 but not 400)
/// - 2024: leap
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1..=12) of `year`, 0 for an invalid month
pub fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Convert days since Unix epoch to civil date (year, month, day)
pub fn civil_from_days(days_since_epoch: i64) -> (i32, u8, u8) {
    // Shift epoch to 0000-03-01 so the leap day ends the year
    let z = days_since_epoch + EPOCH_SHIFT;

    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let y = i64::from(yoe) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // 0 = March, 11 = February

    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = if m <= 2 { y + 1 } else { y };

    (year as i32, m, d)
}

/// Convert civil date (year, month, day) to days since Unix epoch
pub fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
    let y = i64::from(year);
    let m = i64::from(month);
    let d = i64::from(day);

    // March = month 0, February = month 11
    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // [0, 399]
    let doy = (153 * m + 2) / 5 + d - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]

    era * 146_097 + doe - EPOCH_SHIFT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn civil(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> CivilDateTime {
        CivilDateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    #[test]
    fn test_leap_year() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(2100));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 13), 0);
    }

    #[test]
    fn test_unix_epoch() {
        assert_eq!(CivilDateTime::from_epoch(0), civil(1970, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_known_timestamps() {
        assert_eq!(
            CivilDateTime::from_epoch(1_672_531_200),
            civil(2023, 1, 1, 0, 0, 0)
        );
        assert_eq!(
            CivilDateTime::from_epoch(1_692_094_830),
            civil(2023, 8, 15, 10, 20, 30)
        );
        assert_eq!(
            CivilDateTime::from_epoch(2_147_483_647),
            civil(2038, 1, 19, 3, 14, 7)
        );
    }

    #[test]
    fn test_before_epoch() {
        assert_eq!(CivilDateTime::from_epoch(-1), civil(1969, 12, 31, 23, 59, 59));
        assert_eq!(civil(1969, 12, 31, 23, 59, 59).to_epoch(), -1);
    }

    #[test]
    fn test_round_trip_conversion() {
        let test_dates = [
            0i64,
            946_684_800,   // 2000-01-01 00:00:00
            1_609_459_200, // 2021-01-01 00:00:00
            1_704_067_200, // 2024-01-01 00:00:00
            4_102_444_800, // 2100-01-01 00:00:00
            -2_208_988_800, // 1900-01-01 00:00:00
        ];

        for &epoch in &test_dates {
            assert_eq!(
                CivilDateTime::from_epoch(epoch).to_epoch(),
                epoch,
                "Round trip failed for timestamp {}",
                epoch
            );
        }
    }

    #[test]
    fn test_leap_day_2024() {
        let leap_day = civil(2024, 2, 29, 0, 0, 0).to_epoch();
        let dt = CivilDateTime::from_epoch(leap_day);
        assert_eq!((dt.year, dt.month, dt.day), (2024, 2, 29));
        assert_eq!(
            CivilDateTime::from_epoch(leap_day + SECONDS_PER_DAY),
            civil(2024, 3, 1, 0, 0, 0)
        );
    }
}
