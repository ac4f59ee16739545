//! WebSocket push channel for job progress.
//!
//! Each subscriber gets its own task that samples the registry on a fixed
//! interval. Subscribers never write to the registry, so a slow or vanished
//! client cannot affect the encode.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use reelcast_core::config::PublisherConfig;
use reelcast_core::registry::is_terminal;
use reelcast_core::ProgressRegistry;
use tokio::time::MissedTickBehavior;

use crate::context::AppContext;
use crate::routes::progress::ProgressResponse;

/// GET /ws/transcode/{id}
pub async fn transcode_ws(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let registry = Arc::clone(&ctx.registry);
    let publisher = ctx.config.publisher.clone();
    ws.on_upgrade(move |socket| publish_progress(socket, registry, id, publisher))
}

/// Stream `{videoId, progress}` frames until the job is terminal or the
/// client goes away.
async fn publish_progress(
    mut socket: WebSocket,
    registry: Arc<ProgressRegistry>,
    id: String,
    publisher: PublisherConfig,
) {
    tracing::debug!(job_id = %id, "Progress subscriber connected");

    let mut ticker = tokio::time::interval(publisher.interval().max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let progress = registry.get(&id);
                let frame = ProgressResponse { video_id: id.clone(), progress };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(job_id = %id, error = %e, "Failed to encode progress frame");
                        return;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(job_id = %id, "Progress subscriber went away");
                    return;
                }
                if is_terminal(progress) {
                    tokio::time::sleep(publisher.final_hold()).await;
                    let _ = socket.send(Message::Close(None)).await;
                    tracing::debug!(job_id = %id, progress, "Progress stream finished");
                    return;
                }
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    tracing::debug!(job_id = %id, "Progress subscriber closed");
                    return;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
