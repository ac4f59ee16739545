//! Process-wide job progress registry.
//!
//! Maps a job id to its last known percent-complete value. Writers are the
//! transcode runners, readers are any number of HTTP and WebSocket
//! subscribers. An absent id reads as `0`; `100` and `-1` are terminal.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Percent value written when a job finishes successfully.
pub const COMPLETE: i32 = 100;
/// Percent value written when a job fails.
pub const FAILED: i32 = -1;

/// Whether `percent` marks the end of a job.
pub fn is_terminal(percent: i32) -> bool {
    percent >= COMPLETE || percent < 0
}

/// Registry value for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEntry {
    pub percent: i32,
    #[serde(skip)]
    pub finished_at: Option<Instant>,
}

impl ProgressEntry {
    fn new(percent: i32) -> Self {
        Self {
            percent,
            finished_at: None,
        }
    }

    fn terminal(percent: i32) -> Self {
        Self {
            percent,
            finished_at: Some(Instant::now()),
        }
    }
}

/// Thread-safe progress store shared between runners and subscribers.
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    entries: DashMap<String, ProgressEntry>,
    running: Arc<DashMap<String, ()>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current percent for `id`, `0` if unknown.
    pub fn get(&self, id: &str) -> i32 {
        self.entries.get(id).map(|e| e.percent).unwrap_or(0)
    }

    /// Full entry for `id`, if one exists.
    pub fn entry(&self, id: &str) -> Option<ProgressEntry> {
        self.entries.get(id).map(|e| *e)
    }

    /// Unconditional write. Terminal values record their finish instant.
    pub fn set(&self, id: &str, percent: i32) {
        let entry = if is_terminal(percent) {
            ProgressEntry::terminal(percent)
        } else {
            ProgressEntry::new(percent)
        };
        self.entries.insert(id.to_string(), entry);
    }

    /// Reset `id` to `0` at the start of a run.
    pub fn begin(&self, id: &str) {
        self.entries.insert(id.to_string(), ProgressEntry::new(0));
        tracing::debug!(job_id = %id, "Progress tracking started");
    }

    /// Record an intermediate reading.
    ///
    /// Keeps the highest value seen so far and never overwrites a value
    /// written by [`complete`](Self::complete) or [`fail`](Self::fail).
    pub fn advance(&self, id: &str, percent: i32) {
        if percent <= 0 || percent > COMPLETE {
            return;
        }
        self.entries
            .entry(id.to_string())
            .and_modify(|e| {
                if e.finished_at.is_none() && percent > e.percent {
                    e.percent = percent;
                }
            })
            .or_insert_with(|| ProgressEntry::new(percent));
    }

    pub fn complete(&self, id: &str) {
        self.entries
            .insert(id.to_string(), ProgressEntry::terminal(COMPLETE));
        tracing::debug!(job_id = %id, "Progress marked complete");
    }

    pub fn fail(&self, id: &str) {
        self.entries
            .insert(id.to_string(), ProgressEntry::terminal(FAILED));
        tracing::debug!(job_id = %id, "Progress marked failed");
    }

    /// Mark `id` as running for as long as the returned guard lives.
    ///
    /// Fails with [`Error::Conflict`] if another guard for `id` is alive.
    /// Does not touch the progress entry.
    pub fn claim(&self, id: &str) -> Result<JobClaim> {
        match self.running.entry(id.to_string()) {
            Entry::Occupied(_) => Err(Error::Conflict(format!(
                "a transcode for '{id}' is already running"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(JobClaim {
                    id: id.to_string(),
                    running: Arc::clone(&self.running),
                })
            }
        }
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.contains_key(id)
    }

    /// All entries, sorted by id.
    pub fn snapshot(&self) -> Vec<(String, i32)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().percent))
            .collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop terminal entries that finished more than `retention` ago.
    ///
    /// Entries of running jobs are kept regardless of age. Returns the
    /// number of entries removed.
    pub fn reap_expired(&self, retention: Duration) -> usize {
        let before = self.entries.len();
        let running = &self.running;
        self.entries.retain(|id, entry| match entry.finished_at {
            Some(at) => at.elapsed() < retention || running.contains_key(id),
            None => true,
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "Reaped expired progress entries");
        }
        removed
    }
}

/// Guard returned by [`ProgressRegistry::claim`]; releases the claim on drop.
#[derive(Debug)]
pub struct JobClaim {
    id: String,
    running: Arc<DashMap<String, ()>>,
}

impl JobClaim {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        self.running.remove(&self.id);
    }
}
