//! # reelcast-av
//!
//! Encoder integration for reelcast.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the ffmpeg path.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Duration probing** ([`probe_duration`]) -- read the source length
//!   from ffmpeg's input summary.
//! - **Progress extraction** ([`extract_percent`]) -- turn encoder output
//!   into a percent-complete value.
//! - **Rendition templates** ([`OutputVariant`]) -- MP4, HLS and DASH
//!   argument lists.
//! - **Job execution** ([`TranscodeRunner`]) -- run a job and publish its
//!   progress into the shared registry.

pub mod command;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod tools;
pub mod variant;

#[cfg(all(test, unix))]
pub(crate) mod testutil;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::{parse_duration, probe_duration};
pub use progress::{clock_to_secs, extract_percent};
pub use runner::{TranscodeOutcome, TranscodeRunner};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use variant::OutputVariant;
