//! Upload, list, inspect and delete source videos.

use std::path::Path as FsPath;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use reelcast_core::{Error, JobId};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::catalog::{normalize_upload_name, VideoEntry};
use crate::context::AppContext;
use crate::error::AppError;

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "video";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub name: String,
    pub url: String,
    pub size: u64,
}

/// GET /api/videos
pub async fn list_videos(State(ctx): State<AppContext>) -> Result<Json<Vec<VideoEntry>>, AppError> {
    let videos = ctx.catalog.blocking(|c| c.list()).await?;
    tracing::debug!(count = videos.len(), "Listing videos");
    Ok(Json(videos))
}

/// GET /api/videos/{id}
pub async fn get_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<VideoEntry>, AppError> {
    let id = JobId::parse(&id)?;
    Ok(Json(ctx.catalog.blocking(move |c| c.get(&id)).await?))
}

/// DELETE /api/videos/{id}
///
/// Refused while a transcode of the same video is running.
pub async fn delete_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = JobId::parse(&id)?;
    if ctx.registry.is_running(id.as_str()) {
        return Err(Error::Conflict(format!("'{id}' is being transcoded")).into());
    }
    ctx.catalog.blocking(move |c| c.delete(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/videos
///
/// Streams the `video` field to disk, enforcing the configured size limit
/// as bytes arrive. Each request writes its own part file, so concurrent
/// uploads of the same name never share one; the file only appears under
/// its final name once it has been received completely, and the last
/// upload to finish wins.
pub async fn upload_video(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let max = ctx.config.storage.max_upload_bytes;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let id = normalize_upload_name(field.file_name().unwrap_or_default())?;
        tokio::fs::create_dir_all(ctx.catalog.uploads_dir())
            .await
            .map_err(Error::from)?;
        let part_path = ctx
            .catalog
            .uploads_dir()
            .join(format!(".{id}.{}.part", Uuid::new_v4().simple()));

        let size = match receive(&mut field, &part_path, max).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(e.into());
            }
        };
        if let Err(e) = tokio::fs::rename(&part_path, ctx.catalog.source_path(&id)).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(Error::from(e).into());
        }

        tracing::info!(video_id = %id, size, "Video uploaded");
        return Ok(Json(UploadResponse {
            id: id.to_string(),
            name: id.to_string(),
            url: format!("/videos/{id}"),
            size,
        }));
    }

    Err(Error::Validation(format!("No '{UPLOAD_FIELD}' file provided")).into())
}

async fn receive(field: &mut Field<'_>, path: &FsPath, max: u64) -> reelcast_core::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| Error::Validation(e.body_text()))?
    {
        size += chunk.len() as u64;
        if size > max {
            return Err(Error::PayloadTooLarge { size, max });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(size)
}
