//! Process settings
//!
//! Priority: env vars > config/{env}.yaml > config/default.yaml > defaults.
//! Environment variables use the `SOFIA` prefix with `__` as the section
//! separator, e.g. `SOFIA__OPENAI__API_KEY`.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which transport the Call Session Bridge drives.
///
/// Both modes share the same conversational logic; the flag only selects
/// how a call's audio reaches the AI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BridgeMode {
    /// Turn-by-turn: Twilio transcribes, we reply with TwiML prompts.
    #[default]
    Transcript,
    /// Bidirectional media stream relayed live to the realtime AI session.
    Streaming,
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Bridge transport mode
    #[serde(default)]
    pub bridge_mode: BridgeMode,

    /// OpenAI credentials and model selection
    #[serde(default)]
    pub openai: OpenAiSettings,

    /// Twilio credentials for SMS confirmations
    #[serde(default)]
    pub twilio: TwilioSettings,

    /// Session lifecycle configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Path to the restaurant domain file (menu + schedule)
    #[serde(default = "default_restaurant_path")]
    pub restaurant_path: String,
}

fn default_restaurant_path() -> String {
    "config/restaurant.yaml".to_string()
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable host for the media-stream WebSocket URL
    /// (Twilio must be able to dial back to `wss://{public_host}/media-stream`)
    #[serde(default)]
    pub public_host: String,
}

fn default_port() -> u16 {
    8010
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_host: String::new(),
        }
    }
}

/// OpenAI capability settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    /// API key (required; startup fails without it)
    #[serde(default)]
    pub api_key: String,
    /// Chat completion model for transcript mode
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Realtime speech model for streaming mode
    #[serde(default = "default_realtime_model")]
    pub realtime_model: String,
    /// Voice for speech output
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Sampling temperature for both modes
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout for chat completions, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_realtime_model() -> String {
    "gpt-4o-realtime-preview".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            chat_model: default_chat_model(),
            realtime_model: default_realtime_model(),
            voice: default_voice(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Twilio SMS settings. Optional: with no credentials the dispatcher
/// degrades to a log-only sink.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TwilioSettings {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_phone_number")]
    pub phone_number: String,
}

fn default_phone_number() -> String {
    "+10000000000".to_string()
}

impl TwilioSettings {
    /// Whether SMS delivery is actually configured
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty()
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum concurrent call sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Idle timeout before a session is garbage collected, in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// How often the cleanup task runs, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_max_sessions() -> usize {
    100
}

fn default_idle_timeout() -> u64 {
    900
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_timeout_secs: default_idle_timeout(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON-formatted logs
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Validate settings. A missing OpenAI key is the one fatal
    /// misconfiguration: without it no call can be served at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai.api_key.is_empty() {
            return Err(ConfigError::MissingKey {
                field: "openai.api_key".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.openai.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "openai.temperature".to_string(),
                message: format!("must be between 0.0 and 2.0, got {}", self.openai.temperature),
            });
        }
        if self.session.max_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.max_sessions".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        // Streaming renders wss://{public_host}/media-stream into the
        // TwiML; an empty host would send Twilio a dead URL on every call.
        if self.bridge_mode == BridgeMode::Streaming && self.server.public_host.is_empty() {
            return Err(ConfigError::MissingKey {
                field: "server.public_host".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from files and environment.
///
/// `env` selects an overlay file, e.g. `Some("production")` reads
/// `config/production.yaml` on top of `config/default.yaml`.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder().add_source(File::with_name("config/default").required(false));

    if let Some(env) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env)).required(false));
    }

    let config = builder
        .add_source(Environment::with_prefix("SOFIA").separator("__"))
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    Ok(settings)
}
