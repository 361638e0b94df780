use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

// Spreadsheet serials count days from this anchor (the 1900 epoch with the
// historical off-by-two already folded in).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parses a raw spreadsheet cell into a calendar date. Accepts numeric
/// spreadsheet serials, `YYYY-MM-DD` and `DD/MM/YYYY` strings; anything
/// unparseable (including absent/null) falls back to today.
pub fn parse_date_value(value: Option<&Value>) -> NaiveDate {
    match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|serial| from_serial(serial))
            .unwrap_or_else(today),
        Some(Value::String(s)) => parse_date_str(s).unwrap_or_else(today),
        _ => today(),
    }
}

/// `YYYY-MM-DD` or `DD/MM/YYYY`; also tolerates a numeric serial that arrived
/// as text.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.contains('-') {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    }
    if s.contains('/') {
        return NaiveDate::parse_from_str(s, "%d/%m/%Y").ok();
    }
    s.parse::<f64>().ok().and_then(from_serial)
}

fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 || serial > 200_000.0 {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    // Fractional part is the time of day; the calendar day is the whole part.
    NaiveDate::from_ymd_opt(y, m, d).map(|epoch| epoch + Duration::days(serial.trunc() as i64))
}

/// Inclusive range check; either bound may be open.
pub fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    if let Some(s) = start {
        if date < s {
            return false;
        }
    }
    if let Some(e) = end {
        if date > e {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn iso_round_trip() {
        let date = d(2025, 3, 7);
        let formatted = date.format("%Y-%m-%d").to_string();
        assert_eq!(parse_date_str(&formatted), Some(date));
    }

    #[test]
    fn brazilian_format() {
        assert_eq!(parse_date_str("07/03/2025"), Some(d(2025, 3, 7)));
        assert_eq!(parse_date_str(" 31/12/2024 "), Some(d(2024, 12, 31)));
    }

    #[test]
    fn spreadsheet_serial() {
        // 25569 is the Unix epoch in spreadsheet days.
        assert_eq!(
            parse_date_value(Some(&json!(25569))),
            d(1970, 1, 1)
        );
        assert_eq!(parse_date_value(Some(&json!(45658))), d(2025, 1, 1));
        // Time-of-day fraction does not shift the calendar day.
        assert_eq!(parse_date_value(Some(&json!(45658.75))), d(2025, 1, 1));
    }

    #[test]
    fn garbage_falls_back_to_today() {
        let now = today();
        assert_eq!(parse_date_value(None), now);
        assert_eq!(parse_date_value(Some(&json!(null))), now);
        assert_eq!(parse_date_value(Some(&json!("not a date"))), now);
        assert_eq!(parse_date_value(Some(&json!(-5))), now);
    }

    #[test]
    fn range_bounds_inclusive() {
        let date = d(2025, 6, 15);
        assert!(in_range(date, None, None));
        assert!(in_range(date, Some(d(2025, 6, 15)), Some(d(2025, 6, 15))));
        assert!(in_range(date, Some(d(2025, 6, 1)), None));
        assert!(!in_range(date, Some(d(2025, 6, 16)), None));
        assert!(!in_range(date, None, Some(d(2025, 6, 14))));
    }
}
