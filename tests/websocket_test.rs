//! Progress push over WebSocket.

mod common;

use std::time::Duration;

use common::{TestHarness, ENCODE_FAIL, PROBE_100S};
use futures::future::join_all;
use futures::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Read frames until the server closes, returning the progress values.
async fn collect_progress(harness: &TestHarness, id: &str) -> (Vec<i64>, bool) {
    let (mut socket, _) = connect_async(harness.ws_url(&format!("/ws/transcode/{id}")))
        .await
        .expect("websocket handshake failed");

    let mut seen = Vec::new();
    let mut closed = false;
    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => panic!("no close frame for {id}; saw {seen:?}"),
            msg = socket.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                    assert_eq!(frame["videoId"], id);
                    seen.push(frame["progress"].as_i64().unwrap());
                }
                Some(Ok(Message::Close(_))) => {
                    closed = true;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            }
        }
    }
    (seen, closed)
}

#[tokio::test]
async fn streams_until_complete_then_closes() {
    let harness = TestHarness::start().await;
    harness.seed_source("clip.mp4");
    let client = reqwest::Client::new();

    let response = client
        .post(harness.url("/api/videos/transcode/clip.mp4"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let (seen, closed) = collect_progress(&harness, "clip.mp4").await;

    assert!(closed, "server did not send a close frame");
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress regressed: {seen:?}");
    assert_eq!(seen.iter().filter(|&&p| p == 100).count(), 1);
}

#[tokio::test]
async fn failure_is_pushed_then_closed() {
    let harness = TestHarness::with_encoder(PROBE_100S, ENCODE_FAIL).await;
    harness.seed_source("clip.mp4");
    let client = reqwest::Client::new();

    client
        .post(harness.url("/api/videos/transcode/clip.mp4"))
        .send()
        .await
        .unwrap();

    let (seen, closed) = collect_progress(&harness, "clip.mp4").await;

    assert!(closed);
    assert_eq!(seen.last(), Some(&-1));
}

/// Subscribe several clients to one job and check they all converge.
async fn subscribers_converge(harness: &TestHarness, id: &str, expected: i64) {
    let client = reqwest::Client::new();
    let response = client
        .post(harness.url(&format!("/api/videos/transcode/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let streams = join_all((0..4).map(|_| collect_progress(harness, id))).await;

    for (i, (seen, closed)) in streams.iter().enumerate() {
        assert!(closed, "subscriber {i} got no close frame");
        assert_eq!(seen.last(), Some(&expected), "subscriber {i} saw {seen:?}");
        let running = &seen[..seen.len() - 1];
        assert!(
            running.windows(2).all(|w| w[0] <= w[1]),
            "subscriber {i} regressed: {seen:?}"
        );
        assert!(running.iter().all(|&p| (0..100).contains(&p)));
    }
}

#[tokio::test]
async fn concurrent_subscribers_all_see_completion() {
    let harness = TestHarness::start().await;
    harness.seed_source("clip.mp4");
    subscribers_converge(&harness, "clip.mp4", 100).await;
}

#[tokio::test]
async fn concurrent_subscribers_all_see_failure() {
    let harness = TestHarness::with_encoder(PROBE_100S, ENCODE_FAIL).await;
    harness.seed_source("clip.mp4");
    subscribers_converge(&harness, "clip.mp4", -1).await;
}

#[tokio::test]
async fn finished_job_sends_single_frame() {
    let harness = TestHarness::start().await;
    harness.ctx.registry.complete("done.mp4");

    let (seen, closed) = collect_progress(&harness, "done.mp4").await;

    assert!(closed);
    assert_eq!(seen, vec![100]);
}

#[tokio::test]
async fn unknown_job_reports_zero_until_client_leaves() {
    let harness = TestHarness::start().await;
    let (mut socket, _) = connect_async(harness.ws_url("/ws/transcode/idle.mp4"))
        .await
        .unwrap();

    for _ in 0..2 {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(frame["progress"], 0);
    }

    socket.send(Message::Close(None)).await.unwrap();
    // Publishing never touches the registry.
    assert!(harness.ctx.registry.entry("idle.mp4").is_none());
}
