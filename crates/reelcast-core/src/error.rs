//! Unified error type for reelcast.
//!
//! Every crate funnels its failures into [`Error`], which carries enough
//! context for API handlers to derive an HTTP status code via
//! [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in reelcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The external encoder binary could not be located.
    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// The source media for a transcode request does not exist.
    #[error("Source video not found: {id}")]
    SourceNotFound {
        /// The job / video identifier that was looked up.
        id: String,
    },

    /// The encoder's stdout or stderr pipe could not be captured.
    #[error("Failed to create {stream} pipe for {tool}")]
    PipeCreationFailed {
        /// Name of the tool being spawned.
        tool: String,
        /// Which stream was missing ("stdout" or "stderr").
        stream: String,
    },

    /// The encoder process could not be spawned.
    #[error("Failed to start {tool}: {message}")]
    ProcessStartFailed {
        /// Name of the tool that failed to start.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The encoder ran but exited unsuccessfully.
    #[error("Transcoding failed: {tool} {status}")]
    ProcessExecutionFailed {
        /// Name of the tool that failed.
        tool: String,
        /// Exit status description (e.g. "exited with code 1").
        status: String,
    },

    /// The source duration could not be determined. Never fatal to a job.
    #[error("Duration probe failed: {0}")]
    DurationProbeFailed(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "video").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting operation is already in progress.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An upload exceeded the configured size limit.
    #[error("File too large: {size} bytes (max {max} bytes)")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: u64,
        /// Configured maximum.
        max: u64,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::EncoderUnavailable(_) => 500,
            Error::SourceNotFound { .. } => 404,
            Error::PipeCreationFailed { .. } => 500,
            Error::ProcessStartFailed { .. } => 500,
            Error::ProcessExecutionFailed { .. } => 500,
            Error::DurationProbeFailed(_) => 422,
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::PayloadTooLarge { .. } => 413,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::EncoderUnavailable(_) => "encoder_unavailable",
            Error::SourceNotFound { .. } => "source_not_found",
            Error::PipeCreationFailed { .. } => "pipe_creation_failed",
            Error::ProcessStartFailed { .. } => "process_start_failed",
            Error::ProcessExecutionFailed { .. } => "process_execution_failed",
            Error::DurationProbeFailed(_) => "duration_probe_failed",
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Conflict(_) => "conflict",
            Error::PayloadTooLarge { .. } => "payload_too_large",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether this error, raised while a job is running, aborts the job.
    ///
    /// Only [`Error::DurationProbeFailed`] is tolerated; the job continues
    /// with an unknown duration.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::DurationProbeFailed(_))
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::SourceNotFound`].
    pub fn source_not_found(id: impl Into<String>) -> Self {
        Error::SourceNotFound { id: id.into() }
    }

    /// Convenience constructor for [`Error::ProcessStartFailed`].
    pub fn process_start(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProcessStartFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ProcessExecutionFailed`].
    pub fn process_execution(tool: impl Into<String>, status: impl Into<String>) -> Self {
        Error::ProcessExecutionFailed {
            tool: tool.into(),
            status: status.into(),
        }
    }

    /// Convenience constructor for [`Error::PipeCreationFailed`].
    pub fn pipe(tool: impl Into<String>, stream: impl Into<String>) -> Self {
        Error::PipeCreationFailed {
            tool: tool.into(),
            stream: stream.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
