//! Application state

use std::sync::Arc;
use std::time::Duration;

use sofia_agent::TurnEngine;
use sofia_config::{prompts, RestaurantConfig, Settings};
use sofia_core::NotificationSink;
use sofia_ledger::{InventoryLedger, OrderBook};
use sofia_llm::{ChatConfig, OpenAiChat};
use sofia_notify::{LogOnlySink, TwilioSms};

use crate::session::CallRegistry;
use crate::ServerError;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub restaurant: Arc<RestaurantConfig>,
    pub engine: Arc<TurnEngine>,
    pub registry: Arc<CallRegistry>,
    /// Persona instructions built once from the live menu
    pub system_message: Arc<String>,
}

impl AppState {
    /// Wire up the ledger, capability clients and turn engine from
    /// settings. The only fatal path is a missing OpenAI key.
    pub fn new(settings: Settings, restaurant: RestaurantConfig) -> Result<Self, ServerError> {
        let restaurant = Arc::new(restaurant);
        let inventory = Arc::new(InventoryLedger::from_schedule(&restaurant.schedule));
        let orders = Arc::new(OrderBook::new());

        let chat = OpenAiChat::new(ChatConfig {
            api_key: settings.openai.api_key.clone(),
            model: settings.openai.chat_model.clone(),
            temperature: settings.openai.temperature,
            timeout: Duration::from_secs(settings.openai.request_timeout_secs),
            ..ChatConfig::default()
        })
        .map_err(|e| ServerError::Internal(format!("Chat backend init failed: {}", e)))?;

        let notifier: Arc<dyn NotificationSink> = if settings.twilio.is_configured() {
            Arc::new(TwilioSms::new(
                settings.twilio.account_sid.clone(),
                settings.twilio.auth_token.clone(),
                settings.twilio.phone_number.clone(),
            ))
        } else {
            tracing::info!("Twilio credentials absent, confirmations will be logged only");
            Arc::new(LogOnlySink)
        };

        let engine = Arc::new(TurnEngine::new(
            Arc::new(chat),
            inventory,
            orders,
            Arc::clone(&restaurant),
            notifier,
        ));

        let registry = Arc::new(CallRegistry::new(
            settings.session.max_sessions,
            Duration::from_secs(settings.session.idle_timeout_secs),
            Duration::from_secs(settings.session.cleanup_interval_secs),
        ));

        let system_message = Arc::new(prompts::system_message(&restaurant));

        Ok(Self {
            settings: Arc::new(settings),
            restaurant,
            engine,
            registry,
            system_message,
        })
    }
}
