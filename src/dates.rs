use chrono::{DateTime, NaiveDate, NaiveTime};

pub const MS_PER_DAY: i64 = 86_400_000;

/// Midnight UTC of `date` as epoch milliseconds.
pub fn date_to_epoch_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

pub fn parse_date_ms(s: &str) -> Option<i64> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .map(date_to_epoch_ms)
}

/// Whole days between two timestamps, order-insensitive.
pub fn days_between(a_ms: i64, b_ms: i64) -> u32 {
    ((a_ms - b_ms).abs() / MS_PER_DAY) as u32
}

pub fn add_days(ts_ms: i64, days: i64) -> i64 {
    ts_ms + days * MS_PER_DAY
}

pub fn ms_to_date_string(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}
