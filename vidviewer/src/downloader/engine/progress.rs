//! Parsing of yt-dlp `--newline` progress output.

use std::sync::LazyLock;

use regex::Regex;

/// Progress reported by one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgressUpdate {
    /// Whole percent, clamped to 100.
    pub percent: u8,
    pub speed: String,
}

static PROGRESS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[download\]\s+(?P<pct>\d+(?:\.\d+)?)%\s+of\s+~?\s*\S+(?:\s+in\s+\S+)?\s+at\s+(?P<speed>Unknown B/s|Unknown speed|\S+)",
    )
    .unwrap()
});

/// Parse a `[download]` progress line; any other line yields `None`.
///
/// ```text
/// [download]  45.0% of 10MiB at 1.2MiB/s ETA 00:05
/// [download]   3.1% of ~ 120.50MiB at  2.00MiB/s ETA 01:00 (frag 3/96)
/// ```
pub fn parse_progress_line(line: &str) -> Option<DownloadProgressUpdate> {
    let caps = PROGRESS_REGEX.captures(line.trim_end())?;
    let pct: f64 = caps.name("pct")?.as_str().parse().ok()?;
    let speed = caps.name("speed")?.as_str().to_string();

    Some(DownloadProgressUpdate {
        percent: pct.clamp(0.0, 100.0) as u8,
        speed,
    })
}
