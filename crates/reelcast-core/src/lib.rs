//! reelcast-core: shared error type, configuration, job model and the
//! progress registry.
//!
//! This crate is the foundational dependency for the other reelcast crates
//! and has no knowledge of ffmpeg or HTTP.

pub mod config;
pub mod error;
pub mod job;
pub mod registry;

// Re-export the most commonly used items at the crate root.
pub use config::Config;
pub use error::{Error, Result};
pub use job::{Bitrate, Job, JobId, OutputFormat, OutputLocation, Resolution};
pub use registry::{JobClaim, ProgressEntry, ProgressRegistry};
