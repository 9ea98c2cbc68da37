//! Sofia Server
//!
//! Axum HTTP server exposing the Twilio webhook endpoints (transcript
//! mode), the media-stream WebSocket (streaming mode), health checks and
//! Prometheus metrics.

pub mod bridge;
pub mod http;
pub mod media;
pub mod metrics;
pub mod session;
pub mod state;
pub mod twiml;

pub use http::create_router;
pub use metrics::init_metrics;
pub use session::{CallRegistry, CallSession};
pub use state::AppState;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Session(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ServerError::WebSocket(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
