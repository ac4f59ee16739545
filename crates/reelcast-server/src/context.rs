//! Application context.
//!
//! [`AppContext`] is the central struct shared across all route handlers via
//! Axum state. Everything in it is immutable or internally synchronized, so
//! cloning it per request is cheap.

use std::sync::Arc;

use reelcast_av::{ToolRegistry, TranscodeRunner};
use reelcast_core::config::Config;
use reelcast_core::ProgressRegistry;

use crate::catalog::Catalog;

/// Application context shared by all request handlers (via Axum state).
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
    /// Per-job progress, written by runners and read by publishers.
    pub registry: Arc<ProgressRegistry>,
    /// Executes transcode jobs against `registry`.
    pub runner: TranscodeRunner,
    /// Uploaded sources and renditions on disk.
    pub catalog: Arc<Catalog>,
}

impl AppContext {
    pub fn new(config: Config, tools: Arc<ToolRegistry>) -> Self {
        let registry = Arc::new(ProgressRegistry::new());
        let runner = TranscodeRunner::new(
            Arc::clone(&tools),
            Arc::clone(&registry),
            config.transcode.clone(),
        );
        let catalog = Arc::new(Catalog::new(&config.storage));
        Self {
            config: Arc::new(config),
            tools,
            registry,
            runner,
            catalog,
        }
    }
}
