//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, storage, tools, transcoding, the progress
//! publisher and the job registry. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub transcode: TranscodeConfig,
    pub publisher: PublisherConfig,
    pub registry: RegistryConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load and parse a configuration file, failing on any error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.storage.uploads_dir == self.storage.transcoded_dir {
            warnings.push(
                "storage.uploads_dir and storage.transcoded_dir are the same directory".into(),
            );
        }

        if self.storage.max_upload_bytes == 0 {
            warnings.push("storage.max_upload_bytes is 0; every upload will be rejected".into());
        }

        if self.tools.probe_timeout_secs == 0 {
            warnings.push("tools.probe_timeout_secs is 0; duration probes will time out".into());
        }

        let valid_presets = [
            "ultrafast",
            "superfast",
            "veryfast",
            "faster",
            "fast",
            "medium",
            "slow",
            "slower",
            "veryslow",
        ];
        if !valid_presets.contains(&self.transcode.video_preset.as_str()) {
            warnings.push(format!(
                "transcode.video_preset '{}' is not a recognized x264 preset (valid: {})",
                self.transcode.video_preset,
                valid_presets.join(", ")
            ));
        }

        if self.transcode.hls_segment_secs == 0 {
            warnings.push("transcode.hls_segment_secs is 0".into());
        }

        if self.publisher.interval_ms == 0 {
            warnings.push("publisher.interval_ms is 0; subscribers will busy-loop".into());
        }

        if self.registry.retention_secs > 0 && self.registry.reap_interval_secs == 0 {
            warnings.push(
                "registry.reap_interval_secs is 0; expired entries will never be reaped".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            cors_origins: vec!["http://localhost:3000".into()],
        }
    }
}

/// Where uploads and renditions live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub uploads_dir: PathBuf,
    pub transcoded_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("./uploads"),
            transcoded_dir: PathBuf::from("./transcoded"),
            max_upload_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_probe_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl ToolsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Encoder argument defaults shared by every rendition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    #[serde(default = "default_video_preset")]
    pub video_preset: String,
    #[serde(default = "default_hls_segment")]
    pub hls_segment_secs: u32,
    #[serde(default = "default_dash_window")]
    pub dash_window_size: u32,
}

fn default_video_preset() -> String {
    "fast".into()
}
fn default_hls_segment() -> u32 {
    10
}
fn default_dash_window() -> u32 {
    5
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            video_preset: default_video_preset(),
            hls_segment_secs: default_hls_segment(),
            dash_window_size: default_dash_window(),
        }
    }
}

/// Push-channel cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub interval_ms: u64,
    /// How long a terminal value is held on the socket before closing.
    pub final_hold_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            final_hold_ms: 1000,
        }
    }
}

impl PublisherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn final_hold(&self) -> Duration {
        Duration::from_millis(self.final_hold_ms)
    }
}

/// Job registry retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Seconds a terminal entry is kept. `0` keeps entries forever.
    pub retention_secs: u64,
    pub reap_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            reap_interval_secs: 60,
        }
    }
}

impl RegistryConfig {
    /// Retention window, or `None` when eviction is disabled.
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_secs > 0).then(|| Duration::from_secs(self.retention_secs))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}
