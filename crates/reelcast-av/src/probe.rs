//! Source duration probing.
//!
//! Runs `ffmpeg -hide_banner -i <source>` without an output file. ffmpeg
//! prints the input summary and exits non-zero, so the exit status is
//! ignored and only the `Duration:` line matters.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use reelcast_core::{Error, Result};

use crate::command::ToolCommand;
use crate::progress::captured_clock;
use crate::tools::ToolRegistry;

static DURATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: (\d+):(\d+):(\d+\.\d+)").expect("valid duration regex")
});

/// Parse the first `Duration: HH:MM:SS.ss` marker in ffmpeg's input summary.
///
/// `Duration: N/A` (live or broken inputs) yields `None`.
pub fn parse_duration(text: &str) -> Option<f64> {
    DURATION_MARKER
        .captures(text)
        .and_then(|c| captured_clock(&c))
}

/// Probe the duration of `source` in seconds.
///
/// # Errors
///
/// Always [`Error::DurationProbeFailed`]: encoder missing, spawn failure,
/// timeout, or no usable marker in the output.
pub async fn probe_duration(tools: &ToolRegistry, source: &Path) -> Result<f64> {
    let ffmpeg = tools
        .require("ffmpeg")
        .map_err(|e| Error::DurationProbeFailed(e.to_string()))?;

    let output = ToolCommand::new(ffmpeg.path.clone())
        .arg("-hide_banner")
        .arg("-i")
        .arg(source.to_string_lossy())
        .timeout(ffmpeg.timeout)
        .output()
        .await
        .map_err(|e| Error::DurationProbeFailed(e.to_string()))?;

    parse_duration(&output.combined()).ok_or_else(|| {
        Error::DurationProbeFailed(format!(
            "no duration reported for {}",
            source.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':
  Metadata:
    major_brand     : isom
  Duration: 00:02:00.00, start: 0.000000, bitrate: 1205 kb/s
  Stream #0:0[0x1](und): Video: h264 (High), yuv420p, 1280x720, 25 fps
At least one output file must be specified
";

    #[test]
    fn parses_input_summary() {
        assert_eq!(parse_duration(SUMMARY), Some(120.0));
    }

    #[test]
    fn parses_hours_and_fraction() {
        assert_eq!(parse_duration("Duration: 01:30:15.25,"), Some(5415.25));
    }

    #[test]
    fn not_available_is_none() {
        assert_eq!(parse_duration("  Duration: N/A, start: 0.0, bitrate: N/A"), None);
    }

    #[test]
    fn missing_marker_is_none() {
        assert_eq!(parse_duration("clip.mp4: No such file or directory"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[tokio::test]
    async fn probe_without_encoder_fails() {
        let err = probe_duration(&ToolRegistry::default(), Path::new("clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DurationProbeFailed(_)));
        assert!(!err.is_fatal());
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use crate::testutil::fake_encoder;
        use std::time::Duration;

        #[tokio::test]
        async fn probe_reads_stderr_and_ignores_exit_status() {
            let dir = tempfile::tempdir().unwrap();
            let ffmpeg = fake_encoder(
                dir.path(),
                "echo '  Duration: 00:01:40.00, start: 0.0' >&2; exit 1",
                "exit 0",
            );
            let tools = ToolRegistry::with_tool("ffmpeg", &ffmpeg, Duration::from_secs(5));
            let secs = probe_duration(&tools, Path::new("clip.mp4")).await.unwrap();
            assert_eq!(secs, 100.0);
        }

        #[tokio::test]
        async fn probe_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let ffmpeg = fake_encoder(dir.path(), "sleep 5", "exit 0");
            let tools = ToolRegistry::with_tool("ffmpeg", &ffmpeg, Duration::from_millis(100));
            let err = probe_duration(&tools, Path::new("clip.mp4")).await.unwrap_err();
            assert!(matches!(err, Error::DurationProbeFailed(ref m) if m.contains("timed out")));
        }

        #[tokio::test]
        async fn probe_without_marker_fails() {
            let dir = tempfile::tempdir().unwrap();
            let ffmpeg = fake_encoder(dir.path(), "echo 'Duration: N/A' >&2; exit 1", "exit 0");
            let tools = ToolRegistry::with_tool("ffmpeg", &ffmpeg, Duration::from_secs(5));
            let err = probe_duration(&tools, Path::new("clip.mp4")).await.unwrap_err();
            assert!(matches!(err, Error::DurationProbeFailed(_)));
        }
    }
}
