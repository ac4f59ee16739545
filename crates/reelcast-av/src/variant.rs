//! ffmpeg argument templates for each rendition kind.
//!
//! [`OutputVariant`] is the single place that knows how a job's format,
//! scale and bitrate turn into an encoder invocation.

use std::path::Path;

use reelcast_core::config::TranscodeConfig;
use reelcast_core::{Error, Job, OutputFormat, OutputLocation, Result};

use crate::command::ToolCommand;

/// Encoder recipe for one rendition kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputVariant {
    /// H.264/AAC in a single progressive MP4 with the moov atom up front.
    Mp4 { preset: String },
    /// Baseline H.264 cut into fixed-length HLS segments, unbounded playlist.
    Hls { segment_secs: u32 },
    /// Baseline H.264 DASH with a templated timeline.
    Dash { window_size: u32 },
}

impl OutputVariant {
    pub fn for_format(format: OutputFormat, config: &TranscodeConfig) -> Self {
        match format {
            OutputFormat::Mp4 => Self::Mp4 {
                preset: config.video_preset.clone(),
            },
            OutputFormat::Hls => Self::Hls {
                segment_secs: config.hls_segment_secs,
            },
            OutputFormat::Dash => Self::Dash {
                window_size: config.dash_window_size,
            },
        }
    }

    /// Create whatever the output location needs before ffmpeg runs.
    ///
    /// Segmented renditions get their directory (idempotent); single files
    /// get their parent directory.
    pub fn prepare(&self, output: &OutputLocation) -> Result<()> {
        let dir = match output {
            OutputLocation::Directory { dir, .. } => Some(dir.as_path()),
            OutputLocation::File { path, .. } => path.parent(),
        };
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Internal(format!(
                    "Failed to create output dir {}: {e}",
                    dir.display()
                ))
            })?;
        }
        Ok(())
    }

    /// Full argument list, input first and output target last.
    pub fn args(&self, job: &Job) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            job.source_path.to_string_lossy().into_owned(),
        ];
        let scale = format!("scale=-2:{}", job.resolution);
        let bitrate = job.bitrate.to_string();

        match self {
            Self::Mp4 { preset } => {
                args.extend(
                    ["-c:v", "libx264", "-preset", preset.as_str(), "-c:a", "aac"]
                        .map(String::from),
                );
                args.extend(["-vf", scale.as_str(), "-b:v", bitrate.as_str()].map(String::from));
                args.extend(["-movflags", "+faststart"].map(String::from));
            }
            Self::Hls { segment_secs } => {
                let segment = segment_secs.to_string();
                args.extend(
                    [
                        "-profile:v",
                        "baseline",
                        "-level",
                        "3.0",
                        "-start_number",
                        "0",
                        "-hls_time",
                        segment.as_str(),
                        "-hls_list_size",
                        "0",
                        "-f",
                        "hls",
                    ]
                    .map(String::from),
                );
                args.extend(["-vf", scale.as_str(), "-b:v", bitrate.as_str()].map(String::from));
            }
            Self::Dash { window_size } => {
                let window = window_size.to_string();
                args.extend(
                    ["-profile:v", "baseline", "-level", "3.0", "-bf", "0", "-f", "dash"]
                        .map(String::from),
                );
                args.extend(["-vf", scale.as_str(), "-b:v", bitrate.as_str()].map(String::from));
                args.extend(
                    [
                        "-use_timeline",
                        "1",
                        "-use_template",
                        "1",
                        "-window_size",
                        window.as_str(),
                        "-adaptation_sets",
                        "id=0,streams=v id=1,streams=a",
                    ]
                    .map(String::from),
                );
            }
        }

        args.extend(["-progress", "pipe:1"].map(String::from));
        args.push(job.output.target().to_string_lossy().into_owned());
        args
    }

    /// Encoder command for `job` using the ffmpeg at `ffmpeg`.
    pub fn command(&self, ffmpeg: &Path, job: &Job) -> ToolCommand {
        let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
        cmd.args(self.args(job));
        cmd
    }
}
