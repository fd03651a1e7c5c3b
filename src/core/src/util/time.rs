//! Small time helpers so call sites don't sprinkle `chrono::Utc::now()`
//! everywhere; also gives tests a single seam to control "now".

use chrono::{DateTime, TimeZone, Utc};

/// Current unix time in seconds, the unit every `mtime`/`ctime` field in
/// this core uses.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

pub fn unix_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

/// RFC 1123 (`HTTP-date`) formatting for `Last-Modified`/`If-Modified-Since`.
pub fn format_http_date(ts: i64) -> String {
    unix_to_datetime(ts).format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_http_date(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.timestamp())
}
