//! Transcode submission.

use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use reelcast_av::{TranscodeOutcome, TranscodeRunner};
use reelcast_core::{Bitrate, Error, Job, JobId, OutputFormat, Resolution};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;

/// Transcode options. Accepted as query parameters, a urlencoded body or
/// multipart form fields; body values win over query values.
#[derive(Debug, Default, Deserialize)]
pub struct TranscodeParams {
    pub format: Option<String>,
    pub resolution: Option<String>,
    pub bitrate: Option<String>,
    /// `true` or `1` blocks until the job finishes.
    pub wait: Option<String>,
}

impl TranscodeParams {
    fn overlay(self, body: TranscodeParams) -> Self {
        Self {
            format: body.format.or(self.format),
            resolution: body.resolution.or(self.resolution),
            bitrate: body.bitrate.or(self.bitrate),
            wait: body.wait.or(self.wait),
        }
    }

    fn wants_wait(&self) -> bool {
        matches!(self.wait.as_deref(), Some("true" | "1"))
    }
}

/// 202 body for a job that was accepted and is running in the background.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeAccepted {
    pub success: bool,
    pub video_id: String,
    pub format: OutputFormat,
    pub resolution: String,
    pub bitrate: String,
    pub url: String,
    pub status: &'static str,
    pub progress_url: String,
    pub ws_url: String,
}

/// 200 body for a job that ran to completion within the request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeFinished {
    pub success: bool,
    pub video_id: String,
    pub format: OutputFormat,
    pub resolution: String,
    pub url: String,
}

/// POST /api/videos/transcode/{id}
///
/// The job always runs on its own task, so a client that disconnects while
/// waiting does not cancel the encode.
pub async fn start_transcode(
    State(ctx): State<AppContext>,
    Path(raw_id): Path<String>,
    Query(query): Query<TranscodeParams>,
    request: Request,
) -> Result<Response, AppError> {
    let id = JobId::parse(&raw_id)?;
    let params = query.overlay(body_params(request).await?);

    let job = Job::new(
        id,
        OutputFormat::from_param(params.format.as_deref()),
        Resolution::from_param(params.resolution.as_deref()),
        Bitrate::from_param(params.bitrate.as_deref()),
        &ctx.config.storage,
    );

    let source_id = job.id.clone();
    if !ctx.catalog.blocking(move |c| Ok(c.contains(&source_id))).await? {
        return Err(Error::source_not_found(job.id.as_str()).into());
    }
    ctx.tools.require("ffmpeg")?;
    let claim = ctx.registry.claim(job.id.as_str())?;

    let wait = params.wants_wait();
    tracing::info!(
        job_id = %job.id,
        format = %job.format,
        resolution = %job.resolution,
        bitrate = %job.bitrate,
        wait,
        "Transcode requested"
    );

    let runner = ctx.runner.clone();
    let task_job = job.clone();
    let handle = tokio::spawn(async move {
        let _claim = claim;
        run_accepted(&runner, &task_job).await
    });

    if wait {
        let outcome = handle
            .await
            .map_err(|e| Error::Internal(format!("transcode task failed: {e}")))??;
        return Ok(Json(TranscodeFinished {
            success: true,
            video_id: outcome.job.to_string(),
            format: job.format,
            resolution: job.resolution.to_string(),
            url: outcome.url,
        })
        .into_response());
    }

    let video_id = job.id.to_string();
    Ok((
        StatusCode::ACCEPTED,
        Json(TranscodeAccepted {
            success: true,
            progress_url: format!("/api/transcode/progress/{video_id}"),
            ws_url: format!("/ws/transcode/{video_id}"),
            video_id,
            format: job.format,
            resolution: job.resolution.to_string(),
            bitrate: job.bitrate.to_string(),
            url: job.output.url().to_string(),
            status: "accepted",
        }),
    )
        .into_response())
}

/// Run an accepted job on its own task.
///
/// Once a job has been accepted, any failure is reported as `-1`, including
/// ones the runner hits before it marks the job running.
async fn run_accepted(
    runner: &TranscodeRunner,
    job: &Job,
) -> reelcast_core::Result<TranscodeOutcome> {
    let result = runner.run(job).await;
    if let Err(e) = &result {
        runner.registry().fail(job.id.as_str());
        tracing::warn!(job_id = %job.id, error = %e, "Accepted transcode did not finish");
    }
    result
}

/// Read transcode options from the request body, if it carries a form.
async fn body_params(request: Request) -> Result<TranscodeParams, Error> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        let mut params = TranscodeParams::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| Error::Validation(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let value = field
                .text()
                .await
                .map_err(|e| Error::Validation(e.body_text()))?;
            match name.as_str() {
                "format" => params.format = Some(value),
                "resolution" => params.resolution = Some(value),
                "bitrate" => params.bitrate = Some(value),
                "wait" => params.wait = Some(value),
                _ => {}
            }
        }
        Ok(params)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(params) = Form::<TranscodeParams>::from_request(request, &())
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        Ok(params)
    } else {
        Ok(TranscodeParams::default())
    }
}
