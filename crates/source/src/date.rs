// ABOUTME: Flexible date parsing for scraped registration and comment dates.
// ABOUTME: Emits `YYYY-MM-DD HH:MM:SS`, keeping the site's local wall-clock time.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Output layout of every normalised date.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    // Naver style: "2024.01.02. 13:45"
    "%Y.%m.%d. %H:%M:%S",
    "%Y.%m.%d. %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d.", "%Y.%m.%d", "%Y/%m/%d", "%Y년 %m월 %d일"];

/// Parses `s` in any supported layout.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_local());
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Normalised form of `raw`, or the trimmed raw text when it cannot be parsed.
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => {
            tracing::debug!(raw, "unrecognised date layout; keeping raw text");
            raw.trim().to_string()
        }
    }
}
