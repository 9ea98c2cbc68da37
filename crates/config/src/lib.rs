//! Settings and restaurant domain configuration
//!
//! Two layers of configuration:
//! - `Settings` — process configuration (server, OpenAI, Twilio, sessions),
//!   loaded from YAML files with environment-variable overrides.
//! - `RestaurantConfig` — the restaurant's menu and seat schedule, loaded
//!   once at startup and immutable afterwards.

pub mod prompts;
pub mod restaurant;
pub mod settings;

pub use restaurant::{MenuCatalog, MenuCategory, RestaurantConfig, ScheduleSlot};
pub use settings::{
    load_settings, BridgeMode, ObservabilityConfig, OpenAiSettings, ServerConfig, SessionConfig,
    Settings, TwilioSettings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Missing required setting: {field}")]
    MissingKey { field: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
