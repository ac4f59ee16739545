//! On-disk catalog of uploaded sources and their renditions.
//!
//! Nothing is indexed: every call scans the uploads and transcoded
//! directories, so the listing always reflects what is actually on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelcast_core::config::StorageConfig;
use reelcast_core::{Error, JobId, OutputFormat, Result};
use serde::Serialize;

/// Extensions accepted as-is for uploads and shown in listings.
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mov"];

/// Catalog view of one uploaded source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoEntry {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "hasHLS")]
    pub has_hls: bool,
    #[serde(rename = "hasDASH")]
    pub has_dash: bool,
    #[serde(rename = "hasMP4")]
    pub has_mp4: bool,
    /// Empty when no HLS rendition exists.
    #[serde(rename = "hlsUrl")]
    pub hls_url: String,
    /// Empty when no DASH rendition exists.
    #[serde(rename = "dashUrl")]
    pub dash_url: String,
    /// Only filled in for single-video lookups.
    #[serde(rename = "mp4Versions", skip_serializing_if = "Option::is_none")]
    pub mp4_versions: Option<Vec<String>>,
}

/// Uploads plus renditions rooted at the configured storage directories.
#[derive(Debug, Clone)]
pub struct Catalog {
    uploads_dir: PathBuf,
    transcoded_dir: PathBuf,
}

impl Catalog {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            uploads_dir: storage.uploads_dir.clone(),
            transcoded_dir: storage.transcoded_dir.clone(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn transcoded_dir(&self) -> &Path {
        &self.transcoded_dir
    }

    /// Create both storage directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.uploads_dir, &self.transcoded_dir] {
            std::fs::create_dir_all(dir)?;
            tracing::info!("Using storage directory {}", dir.display());
        }
        Ok(())
    }

    pub fn source_path(&self, id: &JobId) -> PathBuf {
        self.uploads_dir.join(id.as_str())
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.source_path(id).is_file()
    }

    /// Run a catalog operation on the blocking pool.
    ///
    /// Every catalog call touches the filesystem, so async handlers go
    /// through here instead of calling the methods directly.
    pub async fn blocking<T, F>(self: &Arc<Self>, op: F) -> Result<T>
    where
        F: FnOnce(&Catalog) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let catalog = Arc::clone(self);
        tokio::task::spawn_blocking(move || op(&catalog))
            .await
            .map_err(|e| Error::Internal(format!("catalog task failed: {e}")))?
    }

    /// All uploaded videos, sorted by id.
    pub fn list(&self) -> Result<Vec<VideoEntry>> {
        let mut entries = Vec::new();
        for dirent in std::fs::read_dir(&self.uploads_dir)? {
            let dirent = dirent?;
            if !dirent.file_type()?.is_file() {
                continue;
            }
            let Some(name) = dirent.file_name().to_str().map(String::from) else {
                continue;
            };
            if !has_video_extension(&name) {
                continue;
            }
            let Ok(id) = JobId::parse(&name) else {
                continue;
            };
            entries.push(self.entry(&id, false)?);
        }
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// One video including its MP4 rendition URLs.
    pub fn get(&self, id: &JobId) -> Result<VideoEntry> {
        if !self.contains(id) {
            return Err(Error::not_found("video", id));
        }
        self.entry(id, true)
    }

    /// Remove a source and every rendition derived from it.
    ///
    /// Rendition removal is best-effort; only a failure to remove the
    /// source itself is reported.
    pub fn delete(&self, id: &JobId) -> Result<()> {
        let source = self.source_path(id);
        if !source.is_file() {
            return Err(Error::not_found("video", id));
        }
        std::fs::remove_file(&source)?;

        let base = id.base_name();
        let segment_dir = self.transcoded_dir.join(base);
        if segment_dir.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(&segment_dir) {
                tracing::warn!("Failed to remove {}: {e}", segment_dir.display());
            }
        }
        for file in self.mp4_renditions(base)? {
            let path = self.transcoded_dir.join(&file);
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove {}: {e}", path.display());
            }
        }

        tracing::info!(video_id = %id, "Deleted video and renditions");
        Ok(())
    }

    fn entry(&self, id: &JobId, with_versions: bool) -> Result<VideoEntry> {
        let base = id.base_name();
        let segment_url = |format: OutputFormat| -> Option<String> {
            let manifest = format.manifest_name()?;
            self.transcoded_dir
                .join(base)
                .join(manifest)
                .is_file()
                .then(|| format!("/transcoded/{base}/{manifest}"))
        };
        let hls_url = segment_url(OutputFormat::Hls);
        let dash_url = segment_url(OutputFormat::Dash);
        let mp4s = self.mp4_renditions(base)?;

        Ok(VideoEntry {
            id: id.to_string(),
            name: id.to_string(),
            url: format!("/videos/{id}"),
            has_hls: hls_url.is_some(),
            has_dash: dash_url.is_some(),
            has_mp4: !mp4s.is_empty(),
            hls_url: hls_url.unwrap_or_default(),
            dash_url: dash_url.unwrap_or_default(),
            mp4_versions: with_versions.then(|| {
                mp4s.iter()
                    .map(|f| format!("/transcoded/{f}"))
                    .collect()
            }),
        })
    }

    /// File names matching `<base>_*p.mp4` in the transcoded directory.
    fn mp4_renditions(&self, base: &str) -> Result<Vec<String>> {
        let dir = match std::fs::read_dir(&self.transcoded_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let prefix = format!("{base}_");
        let mut names: Vec<String> = dir
            .filter_map(|d| d.ok())
            .filter_map(|d| d.file_name().to_str().map(String::from))
            .filter(|name| {
                name.len() >= prefix.len() + "p.mp4".len()
                    && name.starts_with(&prefix)
                    && name.ends_with("p.mp4")
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

fn has_video_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e))
}

/// Stored name for an uploaded file.
///
/// Directory components sent by the client are dropped, and names without
/// a supported extension get `.mp4` appended.
pub fn normalize_upload_name(client_name: &str) -> Result<JobId> {
    let name = Path::new(client_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.is_empty() {
        return Err(Error::Validation("uploaded file has no name".into()));
    }
    if has_video_extension(name) {
        JobId::parse(name)
    } else {
        JobId::parse(&format!("{name}.mp4"))
    }
}
