//! Transcode job model: identifiers, rendition parameters and output layout.
//!
//! Request parameters are never rejected: unknown formats, resolutions and
//! bitrates fall back to their defaults. Only the job id is validated, since
//! it names a file under the uploads directory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Identifier of a job: the stored file name of its source video.
///
/// Always a single path component, so it can be joined onto a storage
/// directory without escaping it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Validate and wrap a raw id.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::Validation("video id must not be empty".into()));
        }
        if raw == "." || raw == ".." || raw.contains(['/', '\\', '\0']) {
            return Err(Error::Validation(format!(
                "video id '{raw}' must be a plain file name"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id with its final extension removed (`clip.mp4` -> `clip`).
    pub fn base_name(&self) -> &str {
        Path::new(&self.0)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Rendition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Single progressive MP4 file.
    #[default]
    Mp4,
    /// Segmented HLS playlist.
    Hls,
    /// Segmented DASH manifest.
    Dash,
}

impl OutputFormat {
    /// Parse a request value case-insensitively; anything unknown is `Mp4`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("hls") => Self::Hls,
            Some("dash") => Self::Dash,
            _ => Self::Mp4,
        }
    }

    /// Manifest file name for segmented formats.
    pub fn manifest_name(&self) -> Option<&'static str> {
        match self {
            Self::Mp4 => None,
            Self::Hls => Some("playlist.m3u8"),
            Self::Dash => Some("manifest.mpd"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp4 => write!(f, "mp4"),
            Self::Hls => write!(f, "hls"),
            Self::Dash => write!(f, "dash"),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Target output height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolution(u32);

impl Resolution {
    pub const ALLOWED: [u32; 7] = [240, 360, 480, 720, 1080, 1440, 2160];
    pub const DEFAULT: Self = Self(720);

    /// Parse a request value; anything outside [`Self::ALLOWED`] is 720.
    pub fn from_param(value: Option<&str>) -> Self {
        value
            .filter(|v| !v.starts_with(['+', '0']))
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|h| Self::ALLOWED.contains(h))
            .map(Self)
            .unwrap_or(Self::DEFAULT)
    }

    pub fn height(&self) -> u32 {
        self.0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Bitrate
// ---------------------------------------------------------------------------

/// Target video bitrate in kbit/s, rendered as ffmpeg's `<n>k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bitrate(u32);

impl Bitrate {
    pub const ALLOWED_KBPS: [u32; 6] = [500, 1000, 2000, 4000, 8000, 16000];
    pub const DEFAULT: Self = Self(1000);

    /// Parse a request value such as `2000k`; anything else is `1000k`.
    pub fn from_param(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.strip_suffix('k'))
            .filter(|n| !n.starts_with(['+', '0']))
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|kbps| Self::ALLOWED_KBPS.contains(kbps))
            .map(Self)
            .unwrap_or(Self::DEFAULT)
    }

    pub fn kbps(&self) -> u32 {
        self.0
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.0)
    }
}

impl Serialize for Bitrate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// OutputLocation
// ---------------------------------------------------------------------------

/// Where a rendition is written and how it is addressed publicly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    /// One file, e.g. `transcoded/clip_720p.mp4`.
    File { path: PathBuf, url: String },
    /// A directory of segments plus the manifest ffmpeg writes into it.
    Directory {
        dir: PathBuf,
        manifest: PathBuf,
        url: String,
    },
}

impl OutputLocation {
    /// Compute the rendition layout for a job under `transcoded_dir`.
    pub fn for_job(
        id: &JobId,
        format: OutputFormat,
        resolution: Resolution,
        transcoded_dir: &Path,
    ) -> Self {
        let base = id.base_name();
        match format.manifest_name() {
            None => {
                let file_name = format!("{base}_{resolution}p.mp4");
                Self::File {
                    path: transcoded_dir.join(&file_name),
                    url: format!("/transcoded/{file_name}"),
                }
            }
            Some(manifest) => {
                let dir = transcoded_dir.join(base);
                Self::Directory {
                    manifest: dir.join(manifest),
                    dir,
                    url: format!("/transcoded/{base}/{manifest}"),
                }
            }
        }
    }

    /// The path handed to the encoder as its output argument.
    pub fn target(&self) -> &Path {
        match self {
            Self::File { path, .. } => path,
            Self::Directory { manifest, .. } => manifest,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::File { url, .. } | Self::Directory { url, .. } => url,
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A fully resolved transcode request.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub source_path: PathBuf,
    pub format: OutputFormat,
    pub resolution: Resolution,
    pub bitrate: Bitrate,
    pub output: OutputLocation,
}

impl Job {
    pub fn new(
        id: JobId,
        format: OutputFormat,
        resolution: Resolution,
        bitrate: Bitrate,
        storage: &StorageConfig,
    ) -> Self {
        let source_path = storage.uploads_dir.join(id.as_str());
        let output = OutputLocation::for_job(&id, format, resolution, &storage.transcoded_dir);
        Self {
            id,
            source_path,
            format,
            resolution,
            bitrate,
            output,
        }
    }
}
