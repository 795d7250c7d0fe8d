//! Timestamp helpers for the database layer.
//!
//! Library dates are stored as local-time `TEXT` in `%Y-%m-%d %H:%M:%S` form,
//! which keeps lexical and chronological ordering identical.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Format used for `videos.download_date` and `playlists.date`.
pub const LIBRARY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time formatted for library records.
#[inline]
pub fn now_library_date() -> String {
    format_library_date(&Local::now())
}

/// Format any timestamp as a library date.
#[inline]
pub fn format_library_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format(LIBRARY_DATE_FORMAT).to_string()
}

/// Current time as Unix epoch seconds (UTC).
#[inline]
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}
