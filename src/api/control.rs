//! Control endpoints

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::orchestrator::Phase;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Current cycle status
#[derive(Serialize)]
pub struct StatusResponse {
    pub phase: Phase,
}

/// Request body for the say endpoint
#[derive(Deserialize)]
pub struct SayRequest {
    pub text: String,
}

/// Build the control router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(status))
        .route("/api/say", post(say))
        .with_state(state)
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        phase: *state.phase_rx.borrow(),
    })
}

/// Speak a phrase on a background task
///
/// Playback is fire-and-forget; the cycle is never touched.
async fn say(
    State(state): State<ApiState>,
    Json(request): Json<SayRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let text = request.text.trim().to_string();
    if text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text is required".to_string()));
    }

    tokio::spawn(async move {
        if let Err(e) = state.feedback.speak(&text).await {
            tracing::warn!(error = %e, "say request failed");
        }
    });

    Ok(StatusCode::ACCEPTED)
}
