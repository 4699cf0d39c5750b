//! HTTP `Date:` header parsing
//!
//! Accepts the IMF-fixdate shape servers send in practice:
//!
//! ```text
//! Tue, 15 Aug 2023 10:20:30 GMT
//! ```
//!
//! The numeric fields are always taken as UTC. A zone token must be present
//! but its value is ignored.

use super::calendar::{days_in_month, CivilDateTime};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Header name, matched case-insensitively
const HEADER_NAME: &str = "date:";

/// If `line` is a `Date:` header, return its trimmed value
pub fn date_header_value(line: &str) -> Option<&str> {
    let name = line.get(..HEADER_NAME.len())?;
    if !name.eq_ignore_ascii_case(HEADER_NAME) {
        return None;
    }
    Some(line[HEADER_NAME.len()..].trim())
}

/// Parse a header value into seconds since the Unix epoch
pub fn parse_http_date(value: &str) -> Option<i64> {
    // weekday is not checked; the comma may or may not be followed by a space
    let (weekday, rest) = value.trim_start().split_once(',')?;
    if weekday.is_empty() || weekday.contains(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    let mut fields = rest.split_ascii_whitespace();

    let day: u8 = parse_number(fields.next()?, 2)?;
    let month = month_from_abbrev(fields.next()?)?;
    let year: i32 = parse_number(fields.next()?, 4)?;

    let mut clock = fields.next()?.split(':');
    let hour: u8 = parse_number(clock.next()?, 2)?;
    let minute: u8 = parse_number(clock.next()?, 2)?;
    let second: u8 = parse_number(clock.next()?, 2)?;
    if clock.next().is_some() {
        return None;
    }

    // zone token: required, ignored
    fields.next()?;

    if day == 0 || day > days_in_month(year, month) || hour > 23 || minute > 59 || second > 60 {
        return None;
    }

    Some(
        CivilDateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
        .to_epoch(),
    )
}

/// 1-based month number from its three-letter English abbreviation
fn month_from_abbrev(abbrev: &str) -> Option<u8> {
    MONTHS
        .iter()
        .position(|m| *m == abbrev)
        .map(|i| i as u8 + 1)
}

/// Parse at most `max_digits` ASCII digits
fn parse_number<T: core::str::FromStr>(field: &str, max_digits: usize) -> Option<T> {
    if field.is_empty() || field.len() > max_digits || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_date() {
        assert_eq!(
            parse_http_date("Tue, 15 Aug 2023 10:20:30 GMT"),
            Some(1_692_094_830)
        );
    }

    #[test]
    fn test_zone_token_ignored() {
        assert_eq!(
            parse_http_date("Tue, 15 Aug 2023 10:20:30 EST"),
            Some(1_692_094_830)
        );
        assert_eq!(parse_http_date("Tue, 15 Aug 2023 10:20:30"), None);
    }

    #[test]
    fn test_single_digit_day() {
        assert_eq!(
            parse_http_date("Fri, 1 Sep 2023 00:00:00 GMT"),
            Some(1_693_526_400)
        );
    }

    #[test]
    fn test_no_space_after_weekday_comma() {
        assert_eq!(
            parse_http_date("Tue,15 Aug 2023 10:20:30 GMT"),
            parse_http_date("Tue, 15 Aug 2023 10:20:30 GMT")
        );
        assert!(parse_http_date("Tue,15 Aug 2023 10:20:30 GMT").is_some());
    }

    #[test]
    fn test_rejects_malformed() {
        for value in [
            "",
            "Tue 15 Aug 2023 10:20:30 GMT",
            ", 15 Aug 2023 10:20:30 GMT",
            "Tue, 15 Foo 2023 10:20:30 GMT",
            "Tue, 15 aug 2023 10:20:30 GMT",
            "Tue, 15 Aug 2023 10:20 GMT",
            "Tue, 15 Aug 2023 10:20:30:00 GMT",
            "Tue, xx Aug 2023 10:20:30 GMT",
            "Tue, -5 Aug 2023 10:20:30 GMT",
        ] {
            assert_eq!(parse_http_date(value), None, "{:?}", value);
        }
    }

    #[test]
    fn test_rejects_out_of_range_fields() {
        for value in [
            "Tue, 00 Aug 2023 10:20:30 GMT",
            "Tue, 32 Aug 2023 10:20:30 GMT",
            "Wed, 29 Feb 2023 10:20:30 GMT",
            "Tue, 15 Aug 2023 24:00:00 GMT",
            "Tue, 15 Aug 2023 10:60:00 GMT",
            "Tue, 15 Aug 2023 10:20:61 GMT",
        ] {
            assert_eq!(parse_http_date(value), None, "{:?}", value);
        }
        assert!(parse_http_date("Thu, 29 Feb 2024 10:20:30 GMT").is_some());
    }

    #[test]
    fn test_date_header_value() {
        assert_eq!(
            date_header_value("Date: Tue, 15 Aug 2023 10:20:30 GMT\r"),
            Some("Tue, 15 Aug 2023 10:20:30 GMT")
        );
        assert_eq!(date_header_value("date:Tue"), Some("Tue"));
        assert_eq!(date_header_value("Content-Length: 0"), None);
        assert_eq!(date_header_value("Dat"), None);
    }
}
