//! Axum router construction.
//!
//! Builds the full application router with all route groups, middleware
//! layers, and static file serving for uploads and renditions.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = cors_layer(&ctx.config.server.cors_origins);

    let api = Router::new()
        // Uploads are streamed to disk and size-checked by the handler.
        .route(
            "/videos",
            get(routes::videos::list_videos)
                .post(routes::videos::upload_video)
                .layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/videos/{id}",
            get(routes::videos::get_video).delete(routes::videos::delete_video),
        )
        .route(
            "/videos/transcode/{id}",
            post(routes::transcode::start_transcode),
        )
        .route(
            "/transcode/progress/{id}",
            get(routes::progress::get_progress),
        );

    let uploads = ServeDir::new(ctx.catalog.uploads_dir());
    let transcoded = ServeDir::new(ctx.catalog.transcoded_dir());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/ws/transcode/{id}", get(routes::ws::transcode_ws))
        .nest("/api", api)
        .nest_service("/videos", uploads)
        .nest_service("/transcoded", transcoded)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// CORS for the configured origins; an empty list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {o:?}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(86400))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use reelcast_av::ToolRegistry;
    use reelcast_core::Config;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn context(tmp: &tempfile::TempDir) -> AppContext {
        let mut config = Config::default();
        config.storage.uploads_dir = tmp.path().join("uploads");
        config.storage.transcoded_dir = tmp.path().join("transcoded");
        let ctx = AppContext::new(config, Arc::new(ToolRegistry::default()));
        ctx.catalog.ensure_dirs().unwrap();
        ctx
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_missing_encoder() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(context(&tmp));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["encoder"], false);
    }

    #[tokio::test]
    async fn progress_defaults_to_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(context(&tmp));
        let response = app
            .oneshot(
                Request::get("/api/transcode/progress/clip.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["videoId"], "clip.mp4");
        assert_eq!(body["progress"], 0);
    }

    #[tokio::test]
    async fn progress_reads_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        ctx.registry.fail("clip.mp4");
        let app = build_router(ctx);
        let response = app
            .oneshot(
                Request::get("/api/transcode/progress/clip.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["progress"], -1);
    }

    #[tokio::test]
    async fn transcode_missing_source_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(context(&tmp));
        let response = app
            .oneshot(
                Request::post("/api/videos/transcode/ghost.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "source_not_found");
    }

    #[tokio::test]
    async fn transcode_without_encoder_is_500() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        std::fs::write(ctx.catalog.uploads_dir().join("clip.mp4"), b"x").unwrap();
        let registry = Arc::clone(&ctx.registry);
        let app = build_router(ctx);
        let response = app
            .oneshot(
                Request::post("/api/videos/transcode/clip.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "encoder_unavailable");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn transcode_rejects_nested_id() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(context(&tmp));
        let response = app
            .oneshot(
                Request::post("/api/videos/transcode/a%2Fb.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(context(&tmp));
        let response = app
            .oneshot(Request::get("/ws/transcode/clip.mp4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn uploads_are_served_statically() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        std::fs::write(ctx.catalog.uploads_dir().join("clip.mp4"), b"video-bytes").unwrap();
        let app = build_router(ctx);
        let response = app
            .oneshot(Request::get("/videos/clip.mp4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"video-bytes");
    }

    fn upload_request(file_name: &str, fill: u8, len: usize) -> Request<Body> {
        const BOUNDARY: &str = "reelcast-test-boundary";
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"video\"; filename=\"{file_name}\"\r\n\
             Content-Type: video/mp4\r\n\r\n"
        )
        .into_bytes();
        body.extend(std::iter::repeat(fill).take(len));
        body.extend(format!("\r\n--{BOUNDARY}--\r\n").into_bytes());

        Request::post("/api/videos")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn concurrent_same_name_uploads_do_not_collide() {
        const LEN: usize = 1 << 20;
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let uploads = ctx.catalog.uploads_dir().to_path_buf();
        let app = build_router(ctx);

        for _ in 0..5 {
            let (a, b) = tokio::join!(
                app.clone().oneshot(upload_request("clip.mp4", b'A', LEN)),
                app.clone().oneshot(upload_request("clip.mp4", b'B', LEN)),
            );
            assert_eq!(a.unwrap().status(), StatusCode::OK);
            assert_eq!(b.unwrap().status(), StatusCode::OK);

            let stored = std::fs::read(uploads.join("clip.mp4")).unwrap();
            assert_eq!(stored.len(), LEN);
            let first = stored[0];
            assert!(first == b'A' || first == b'B');
            assert!(stored.iter().all(|&byte| byte == first), "upload bytes interleaved");

            let names: Vec<_> = std::fs::read_dir(&uploads)
                .unwrap()
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect();
            assert_eq!(names, vec!["clip.mp4".to_string()], "part file left behind");
        }
    }

    #[test]
    fn empty_origin_list_allows_any() {
        // Building the layer must not panic for either shape.
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["http://localhost:3000".to_string()]);
    }
}
