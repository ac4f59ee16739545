//! Percent-complete extraction from encoder output.
//!
//! ffmpeg's `-progress pipe:1` emits `key=value` lines; the one we care
//! about is `out_time=HH:MM:SS.micros`. The same `time=` marker appears in
//! the classic stderr status line, so either stream can be fed in.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static TIME_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=(\d+):(\d+):(\d+\.\d+)").expect("valid time regex")
});

/// Convert a clock reading to seconds.
pub fn clock_to_secs(hours: u64, minutes: u64, seconds: f64) -> f64 {
    hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds
}

/// Seconds from a `(h)(m)(s.ss)` capture triple starting at group 1.
pub(crate) fn captured_clock(caps: &Captures<'_>) -> Option<f64> {
    let hours = caps.get(1)?.as_str().parse().ok()?;
    let minutes = caps.get(2)?.as_str().parse().ok()?;
    let seconds = caps.get(3)?.as_str().parse().ok()?;
    Some(clock_to_secs(hours, minutes, seconds))
}

/// Elapsed encode time reported in `chunk`, if it carries a time marker.
pub fn elapsed_secs(chunk: &str) -> Option<f64> {
    TIME_MARKER.captures(chunk).and_then(|c| captured_clock(&c))
}

/// Percent complete for a chunk of encoder output.
///
/// Returns `0` when the chunk has no time marker or the total duration is
/// unknown (`<= 0`). Otherwise `floor(100 * elapsed / total)`, unclamped:
/// a stale or short probe can yield values above 100.
pub fn extract_percent(chunk: &str, total_duration: f64) -> i32 {
    if total_duration <= 0.0 {
        return 0;
    }
    match elapsed_secs(chunk) {
        Some(elapsed) => (100.0 * elapsed / total_duration).floor() as i32,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_conversion() {
        assert_eq!(clock_to_secs(0, 0, 0.0), 0.0);
        assert_eq!(clock_to_secs(1, 2, 3.5), 3723.5);
    }

    #[test]
    fn progress_line_half_way() {
        assert_eq!(extract_percent("out_time=00:00:50.000000", 100.0), 50);
    }

    #[test]
    fn stderr_status_line() {
        let line = "frame=  240 fps=60 q=28.0 size=1024kB time=00:00:30.00 bitrate=279.6kbits/s";
        assert_eq!(extract_percent(line, 120.0), 25);
    }

    #[test]
    fn first_marker_wins() {
        let chunk = "out_time=00:00:10.00\nout_time=00:00:90.00\n";
        assert_eq!(extract_percent(chunk, 100.0), 10);
    }

    #[test]
    fn floors_fractional_percent() {
        assert_eq!(extract_percent("time=00:00:33.33", 100.0), 33);
        assert_eq!(extract_percent("time=00:00:00.99", 100.0), 0);
    }

    #[test]
    fn no_marker_is_zero() {
        assert_eq!(extract_percent("frame=10\nfps=25.0\n", 100.0), 0);
        assert_eq!(extract_percent("", 100.0), 0);
        assert_eq!(extract_percent("out_time=N/A", 100.0), 0);
    }

    #[test]
    fn negative_start_time_is_ignored() {
        assert_eq!(extract_percent("out_time=-577014:32:22.771807", 100.0), 0);
    }

    #[test]
    fn unknown_duration_is_zero() {
        assert_eq!(extract_percent("time=00:00:50.00", 0.0), 0);
        assert_eq!(extract_percent("time=00:00:50.00", -3.0), 0);
    }

    #[test]
    fn overshoot_is_not_clamped() {
        assert_eq!(extract_percent("time=00:02:30.00", 100.0), 150);
    }

    #[test]
    fn hours_and_minutes_count() {
        assert_eq!(elapsed_secs("time=01:01:01.50"), Some(3661.5));
        assert_eq!(extract_percent("time=00:01:00.00", 240.0), 25);
    }
}
