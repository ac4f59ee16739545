//! Liveness endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Whether ffmpeg was found at startup.
    pub encoder: bool,
    pub version: &'static str,
}

/// GET /health
pub async fn health_check(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        encoder: ctx.tools.is_available("ffmpeg"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
