//! Control surface endpoint tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tokio::sync::watch;
use tower::ServiceExt;

use lyrebird::Result;
use lyrebird::api::{ApiServer, ApiState};
use lyrebird::config::RestApiSettings;
use lyrebird::feedback::Feedback;
use lyrebird::orchestrator::Phase;

/// Feedback provider that records instead of playing
#[derive(Default)]
struct RecordingFeedback {
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl Feedback for RecordingFeedback {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn play_sound(&self, _path: &std::path::Path) -> Result<()> {
        Ok(())
    }
}

fn build_test_router(phase: Phase) -> (axum::Router, Arc<RecordingFeedback>) {
    let feedback = Arc::new(RecordingFeedback::default());
    // The receiver keeps the last value even after the sender drops
    let (_, phase_rx) = watch::channel(phase);

    let settings = RestApiSettings {
        enabled: true,
        port: 5000,
        allowed_origin: "*".to_string(),
    };

    let state = ApiState {
        feedback: Arc::clone(&feedback) as Arc<dyn Feedback>,
        phase_rx,
    };

    (ApiServer::new(&settings, state).router(), feedback)
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _) = build_test_router(Phase::Idle);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn status_reports_the_current_phase() {
    let (app, _) = build_test_router(Phase::AwaitingTrigger);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["phase"], "awaiting_trigger");
}

#[tokio::test]
async fn say_speaks_through_feedback() {
    let (app, feedback) = build_test_router(Phase::Idle);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/say")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"text":"hello there"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Playback runs on a background task
    for _ in 0..100 {
        if !feedback.spoken.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(*feedback.spoken.lock().unwrap(), vec!["hello there".to_string()]);
}

#[tokio::test]
async fn say_rejects_empty_text() {
    let (app, feedback) = build_test_router(Phase::Idle);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/say")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"text":"   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(feedback.spoken.lock().unwrap().is_empty());
}
