//! Transcode job execution.
//!
//! A run moves a job through `Pending -> Running -> {Complete, Failed}`.
//! While ffmpeg runs, stdout (the `-progress pipe:1` stream) and stderr
//! (diagnostics) are drained by two concurrent tasks so neither pipe can
//! fill up and stall the encoder.

use std::sync::Arc;

use reelcast_core::config::TranscodeConfig;
use reelcast_core::registry::COMPLETE;
use reelcast_core::{Error, Job, JobId, OutputLocation, ProgressRegistry, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::command::describe_status;
use crate::probe::probe_duration;
use crate::progress::extract_percent;
use crate::tools::{ToolConfig, ToolRegistry};
use crate::variant::OutputVariant;

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct TranscodeOutcome {
    pub job: JobId,
    pub output: OutputLocation,
    /// Public URL of the rendition.
    pub url: String,
    /// Probed source duration, `0.0` when unknown.
    pub duration_secs: f64,
    /// Bytes of diagnostic output ffmpeg wrote to stderr.
    pub diagnostics_len: usize,
}

/// Runs transcode jobs and reports their progress into a shared registry.
#[derive(Debug, Clone)]
pub struct TranscodeRunner {
    tools: Arc<ToolRegistry>,
    registry: Arc<ProgressRegistry>,
    config: TranscodeConfig,
}

impl TranscodeRunner {
    pub fn new(
        tools: Arc<ToolRegistry>,
        registry: Arc<ProgressRegistry>,
        config: TranscodeConfig,
    ) -> Self {
        Self {
            tools,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.registry
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run `job` to completion.
    ///
    /// Encoder and source checks happen before the registry is touched.
    /// From the moment the job is marked running, every failure leaves
    /// `-1` in the registry and success leaves `100`.
    pub async fn run(&self, job: &Job) -> Result<TranscodeOutcome> {
        let id = job.id.as_str();
        let ffmpeg = self.tools.require("ffmpeg")?;

        if !tokio::fs::try_exists(&job.source_path).await.unwrap_or(false) {
            return Err(Error::source_not_found(id));
        }

        let duration_secs = match probe_duration(&self.tools, &job.source_path).await {
            Ok(secs) => secs,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(job_id = %id, error = %e, "Duration unknown; progress will stay at 0");
                0.0
            }
            Err(e) => return Err(e),
        };

        self.registry.begin(id);
        tracing::info!(
            job_id = %id,
            format = %job.format,
            resolution = %job.resolution,
            bitrate = %job.bitrate,
            duration_secs,
            "Transcode started"
        );

        match self.encode(ffmpeg, job, duration_secs).await {
            Ok(diagnostics_len) => {
                self.registry.complete(id);
                tracing::info!(job_id = %id, url = job.output.url(), "Transcode complete");
                Ok(TranscodeOutcome {
                    job: job.id.clone(),
                    output: job.output.clone(),
                    url: job.output.url().to_string(),
                    duration_secs,
                    diagnostics_len,
                })
            }
            Err(e) => {
                self.registry.fail(id);
                tracing::error!(job_id = %id, error = %e, "Transcode failed");
                Err(e)
            }
        }
    }

    /// Spawn the encoder and wait for it. Returns the diagnostics length.
    async fn encode(&self, ffmpeg: &ToolConfig, job: &Job, total: f64) -> Result<usize> {
        let id = job.id.as_str();
        let variant = OutputVariant::for_format(job.format, &self.config);
        variant.prepare(&job.output)?;

        let cmd = variant.command(&ffmpeg.path, job);
        tracing::debug!(job_id = %id, args = ?cmd.get_args(), "Running {}", ffmpeg.name);

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::pipe(&ffmpeg.name, "stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::pipe(&ffmpeg.name, "stderr"))?;

        let progress = tokio::spawn(drain_progress(
            stdout,
            Arc::clone(&self.registry),
            id.to_string(),
            total,
        ));
        let diagnostics = tokio::spawn(drain_diagnostics(stderr));

        let status = child.wait().await.map_err(|e| {
            Error::process_execution(&ffmpeg.name, format!("I/O error waiting for process: {e}"))
        })?;

        if let Err(e) = progress.await {
            tracing::warn!(job_id = %id, error = %e, "Progress drain task failed");
        }
        let diagnostics = diagnostics.await.unwrap_or_else(|e| {
            tracing::warn!(job_id = %id, error = %e, "Diagnostics drain task failed");
            String::new()
        });

        if !status.success() {
            tracing::warn!(
                job_id = %id,
                status = %status,
                diagnostics = %diagnostics.trim_end(),
                "Encoder exited unsuccessfully"
            );
            return Err(Error::process_execution(&ffmpeg.name, describe_status(status)));
        }

        tracing::debug!(job_id = %id, diagnostics = %diagnostics.trim_end(), "Encoder output");
        Ok(diagnostics.len())
    }
}

/// Feed each progress line through the extractor into the registry.
async fn drain_progress(
    stdout: impl AsyncRead + Unpin,
    registry: Arc<ProgressRegistry>,
    id: String,
    total: f64,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let percent = extract_percent(&String::from_utf8_lossy(&line), total);
                if percent > 0 && percent <= COMPLETE {
                    registry.advance(&id, percent);
                    tracing::trace!(job_id = %id, percent, "Progress");
                }
            }
            Err(e) => {
                tracing::debug!(job_id = %id, error = %e, "Progress stream read failed");
                break;
            }
        }
    }
}

/// Collect everything written to stderr.
async fn drain_diagnostics(mut stderr: impl AsyncRead + Unpin) -> String {
    let mut buf = Vec::new();
    if let Err(e) = stderr.read_to_end(&mut buf).await {
        tracing::debug!(error = %e, "Diagnostic stream read failed");
    }
    String::from_utf8_lossy(&buf).into_owned()
}
