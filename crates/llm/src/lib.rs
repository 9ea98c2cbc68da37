//! OpenAI capability backends
//!
//! Two clients for the two transport modes:
//! - `OpenAiChat` — chat completions over HTTP, used by the turn engine
//!   in transcript mode.
//! - `RealtimeSession` — a speech-to-speech session over WebSocket, used
//!   by the media-stream relay in streaming mode.

pub mod chat;
pub mod realtime;

pub use chat::{ChatConfig, OpenAiChat};
pub use realtime::{RealtimeConfig, RealtimeEvent, RealtimeHandle, RealtimeSession};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for LlmError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        LlmError::WebSocket(err.to_string())
    }
}

impl From<LlmError> for sofia_core::Error {
    fn from(err: LlmError) -> Self {
        sofia_core::Error::Llm(err.to_string())
    }
}
