//! Calendar and clock helpers shared by the codecs and the sync engine.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

/// Current instant as an RFC 3339 string, the timestamp format used on the
/// wire and in persisted state.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Parse an RFC 3339 timestamp, normalising to UTC.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Strict `YYYY-MM-DD` calendar date validation.
///
/// The reformat-equality check rejects both impossible dates ("2024-02-30")
/// and sloppy spellings ("2024-2-3") that a plain parse would accept.
pub fn parse_strict_date(value: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    if date.format("%Y-%m-%d").to_string() == value {
        Some(date)
    } else {
        None
    }
}

/// Validate a wall-clock `HH:MM` value (00-23 hours, 00-59 minutes).
/// Returns the input unchanged when valid; malformed values yield `None`.
pub fn valid_hhmm(value: &str) -> Option<&str> {
    let (hours, minutes) = value.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let h: u32 = hours.parse().ok()?;
    let m: u32 = minutes.parse().ok()?;
    if h <= 23 && m <= 59 {
        Some(value)
    } else {
        None
    }
}

/// Whole months between two dates, flooring partial months.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    let mut months =
        (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months
}

/// Add a whole number of months to a date, clamping the day when the target
/// month is shorter.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_date_rejects_impossible_and_unnormalised_dates() {
        assert!(parse_strict_date("2024-03-01").is_some());
        assert!(parse_strict_date("2024-02-30").is_none());
        assert!(parse_strict_date("2024-2-3").is_none());
        assert!(parse_strict_date("not-a-date").is_none());
    }

    #[test]
    fn hhmm_bounds() {
        assert_eq!(valid_hhmm("00:00"), Some("00:00"));
        assert_eq!(valid_hhmm("23:59"), Some("23:59"));
        assert_eq!(valid_hhmm("24:00"), None);
        assert_eq!(valid_hhmm("12:60"), None);
        assert_eq!(valid_hhmm("9:30"), None);
        assert_eq!(valid_hhmm("0930"), None);
    }

    #[test]
    fn months_between_floors_partial_months() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            months_between(from, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()),
            12
        );
        assert_eq!(
            months_between(from, NaiveDate::from_ymd_opt(2025, 1, 14).unwrap()),
            11
        );
    }

    #[test]
    fn add_months_clamps_short_months() {
        let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            add_months(jan31, 1),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }
}
