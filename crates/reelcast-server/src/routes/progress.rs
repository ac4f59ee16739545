//! Poll endpoint for job progress.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

/// Progress snapshot, shared by the poll endpoint and the push channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub video_id: String,
    /// `0..=100`, or `-1` once the job has failed.
    pub progress: i32,
}

/// GET /api/transcode/progress/{id}
///
/// Unknown ids report `0`, the same as a job that has not started yet.
pub async fn get_progress(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Json<ProgressResponse> {
    let progress = ctx.registry.get(&id);
    Json(ProgressResponse {
        video_id: id,
        progress,
    })
}
