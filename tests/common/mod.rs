//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] over a
//! temporary storage root and a scripted stand-in for ffmpeg, then serves
//! it on a random local port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reelcast_av::ToolRegistry;
use reelcast_core::Config;
use reelcast_server::context::AppContext;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Probe output reporting a 100 second source.
pub const PROBE_100S: &str = "echo '  Duration: 00:01:40.00, start: 0.0' >&2; exit 1";

/// Encode body that reports 25/50/75% with small pauses, then writes the
/// output target.
pub const ENCODE_OK: &str = "for t in 25 50 75; do echo \"out_time=00:00:$t.000000\"; sleep 0.1; done; \
     mkdir -p \"$(dirname \"$last\")\"; touch \"$last\"";

/// Encode body that reports some progress and then fails.
pub const ENCODE_FAIL: &str = "echo 'out_time=00:00:10.000000'; sleep 0.1; echo 'codec exploded' >&2; exit 1";

/// Write an executable `ffmpeg` script that runs `encode` for transcodes
/// (invocations carrying `-progress`) and `probe` otherwise.
pub fn fake_encoder(dir: &Path, probe: &str, encode: &str) -> PathBuf {
    let script = format!(
        "#!/bin/sh\n\
         for last; do :; done\n\
         mode=probe\n\
         for arg; do\n\
         \x20 if [ \"$arg\" = \"-progress\" ]; then mode=encode; fi\n\
         done\n\
         if [ \"$mode\" = encode ]; then\n\
         {encode}\n\
         else\n\
         {probe}\n\
         fi\n"
    );
    let path = dir.join("ffmpeg");
    std::fs::write(&path, script).expect("failed to write fake encoder");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to mark fake encoder executable");
    path
}

/// A running server over a throwaway storage root.
pub struct TestHarness {
    pub ctx: AppContext,
    pub addr: SocketAddr,
    pub cancel: CancellationToken,
    _root: TempDir,
}

impl TestHarness {
    /// Start a server whose encoder succeeds.
    pub async fn start() -> Self {
        Self::with_encoder(PROBE_100S, ENCODE_OK).await
    }

    /// Start a server whose encoder runs the given script bodies.
    pub async fn with_encoder(probe: &str, encode: &str) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let ffmpeg = fake_encoder(root.path(), probe, encode);
        let tools = ToolRegistry::with_tool("ffmpeg", ffmpeg, Duration::from_secs(5));
        Self::with_tools(root, tools, Config::default()).await
    }

    /// Start a server with no encoder available.
    pub async fn without_encoder() -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        Self::with_tools(root, ToolRegistry::default(), Config::default()).await
    }

    async fn with_tools(root: TempDir, tools: ToolRegistry, mut config: Config) -> Self {
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.storage.uploads_dir = root.path().join("uploads");
        config.storage.transcoded_dir = root.path().join("transcoded");
        config.storage.max_upload_bytes = 1024;
        config.publisher.interval_ms = 50;
        config.publisher.final_hold_ms = 50;

        let ctx = AppContext::new(config, Arc::new(tools));
        ctx.catalog.ensure_dirs().expect("failed to create storage dirs");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let cancel = CancellationToken::new();
        tokio::spawn(reelcast_server::serve(listener, ctx.clone(), cancel.clone()));

        Self {
            ctx,
            addr,
            cancel,
            _root: root,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }

    /// Drop a source file straight into the uploads directory.
    pub fn seed_source(&self, name: &str) {
        std::fs::write(self.ctx.catalog.uploads_dir().join(name), b"not really a video")
            .expect("failed to seed source");
    }

    /// Poll the progress endpoint until it reports a terminal value.
    pub async fn wait_for_terminal(&self, client: &reqwest::Client, id: &str) -> Vec<i64> {
        let mut seen = Vec::new();
        for _ in 0..100 {
            let body: serde_json::Value = client
                .get(self.url(&format!("/api/transcode/progress/{id}")))
                .send()
                .await
                .expect("progress request failed")
                .json()
                .await
                .expect("progress body was not JSON");
            let progress = body["progress"].as_i64().expect("progress missing");
            seen.push(progress);
            if progress >= 100 || progress < 0 {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job {id} never finished; saw {seen:?}");
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
