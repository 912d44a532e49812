//! HTTP control surface
//!
//! A small read-mostly API over the running assistant: liveness, the
//! current cycle phase, and a speak endpoint. It observes the cycle
//! through a watch receiver and never drives it.

pub mod control;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::RestApiSettings;
use crate::feedback::Feedback;
use crate::orchestrator::Phase;
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Speech output for the say endpoint
    pub feedback: Arc<dyn Feedback>,
    /// Read-only view of the cycle phase
    pub phase_rx: tokio::sync::watch::Receiver<Phase>,
}

/// The control surface server
pub struct ApiServer {
    state: ApiState,
    port: u16,
    allowed_origin: String,
}

impl ApiServer {
    /// Build a server from the REST settings
    #[must_use]
    pub fn new(settings: &RestApiSettings, state: ApiState) -> Self {
        Self {
            state,
            port: settings.port,
            allowed_origin: settings.allowed_origin.clone(),
        }
    }

    /// Assemble the router (public for in-process tests)
    #[must_use]
    pub fn router(&self) -> Router {
        let cors = if self.allowed_origin == "*" {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            match self.allowed_origin.parse::<axum::http::HeaderValue>() {
                Ok(origin) => CorsLayer::new()
                    .allow_origin([origin])
                    .allow_methods(Any)
                    .allow_headers(Any),
                Err(_) => {
                    tracing::warn!(
                        origin = %self.allowed_origin,
                        "invalid allowed origin, falling back to any"
                    );
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any)
                }
            }
        };

        control::router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
