//! HTTP-level integration tests for the async job surface, mirroring
//! `sem_os_server`'s `tower::ServiceExt::oneshot` test style. Uses the
//! in-memory store end to end — no database required.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use tower::ServiceExt;

use ucc_core::config::UccConfig;
use ucc_core::ports::{JobStore, SegmentStore};
use ucc_embed::LocalEmbedder;
use ucc_orchestrator::ProgressBus;
use ucc_server::{build_router, AppState};
use ucc_store::InMemoryStore;

fn build_test_app() -> (axum::Router, AppState) {
    let store = Arc::new(InMemoryStore::new());
    let job_store: Arc<dyn JobStore> = store.clone();
    let segment_store: Arc<dyn SegmentStore> = store;
    let state = AppState::new(
        job_store,
        segment_store,
        Arc::new(LocalEmbedder::new()),
        Arc::new(ProgressBus::new()),
        UccConfig::default(),
    );
    (build_router(state.clone()), state)
}

fn multipart_body(file_a: &str, file_b: &str) -> (String, Vec<u8>) {
    let boundary = "ucctestboundary";
    let mut body = Vec::new();
    for (field, content) in [("file_a", file_a), ("file_b", file_b)] {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"doc.pdf\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (boundary.to_string(), body)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (app, _state) = build_test_app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn submit_compare_then_poll_job_to_completion() {
    let (app, state) = build_test_app();
    let (boundary, body) = multipart_body(
        "Coverage: we will pay for theft.",
        "Coverage: we will pay for theft.\x0cCoverage: we will pay for flood.",
    );

    let request = Request::post("/jobs/compare")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let submitted: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let job_id = submitted["job_id"].as_str().unwrap().to_string();
    assert_eq!(submitted["status"], "QUEUED");

    // Drive the single queued job directly (no worker loop spawned in-test).
    let job = state
        .job_store
        .claim_next_queued()
        .await
        .unwrap()
        .expect("job should be claimable");
    state.orchestrator.drive(job).await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let job: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(job["status"], "COMPLETED");

    let response = app
        .oneshot(
            Request::get(format!("/jobs/{job_id}/result"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let result: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(result["summary"]["counts"]["added"], 1);
}

#[tokio::test]
async fn result_for_unknown_job_is_gone() {
    let (app, _state) = build_test_app();
    let response = app
        .oneshot(
            Request::get(format!("/jobs/{}/result", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn cancel_unknown_job_returns_404() {
    let (app, _state) = build_test_app();
    let response = app
        .oneshot(
            Request::post(format!("/jobs/{}/cancel", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sync_compare_endpoint_returns_comparison_result_directly() {
    let (app, _state) = build_test_app();
    let (boundary, body) = multipart_body(
        "Coverage: we will pay for theft.",
        "Coverage: we will pay for theft.",
    );
    let request = Request::post("/ucc/compare")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = tokio::time::timeout(Duration::from_secs(10), app.oneshot(request))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let result: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(result["summary"]["counts"]["unchanged"], 1);
}
