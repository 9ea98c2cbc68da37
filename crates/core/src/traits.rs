//! Capability traits for pluggable backends
//!
//! The conversation logic only sees these narrow interfaces; the concrete
//! OpenAI and Twilio clients live in their own crates and are injected at
//! startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;
use crate::error::Result;

/// Text completion capability.
///
/// Implementations receive the full conversation history and return the
/// assistant's next reply. A failed call is an error here; the turn
/// engine degrades it to a fixed apology so it is never fatal to a call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate the next assistant reply from the conversation so far.
    async fn complete(&self, history: &[Turn]) -> Result<String>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// A confirmation handed to the notification sink after a ledger commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A table was reserved.
    Reservation {
        date: String,
        time: String,
        party_size: u32,
    },
    /// A takeout order was committed.
    Order { items: Vec<String> },
}

/// Fire-and-forget confirmation delivery.
///
/// Delivery failures are logged by the caller and never retried; by the
/// time a notification is dispatched the ledger mutation has already
/// happened and is not compensated.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a confirmation to the recipient (an E.164 phone number).
    async fn notify(&self, recipient: &str, notification: &Notification) -> Result<()>;
}
