//! Turn engine
//!
//! Runs one conversational turn end to end: record the utterance, get the
//! AI reply (degrading to a fixed apology on failure), apply the ledger
//! operation for the detected intent, merge the ledger outcome into the
//! reply, and decide whether the call ends.

use std::sync::Arc;

use sofia_config::{prompts, RestaurantConfig};
use sofia_core::{ConversationHistory, LanguageModel, Notification, NotificationSink, Turn};
use sofia_ledger::{InventoryLedger, LedgerError, OrderBook};

use crate::intent::{self, Intent};

/// Outcome of one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    /// Text to speak to the caller
    pub text: String,
    /// Whether the hostess hangs up after speaking
    pub end_call: bool,
}

/// One engine is shared by all sessions; per-caller state lives in the
/// ledger and in each session's history.
pub struct TurnEngine {
    llm: Arc<dyn LanguageModel>,
    inventory: Arc<InventoryLedger>,
    orders: Arc<OrderBook>,
    restaurant: Arc<RestaurantConfig>,
    notifier: Arc<dyn NotificationSink>,
}

impl TurnEngine {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        inventory: Arc<InventoryLedger>,
        orders: Arc<OrderBook>,
        restaurant: Arc<RestaurantConfig>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            llm,
            inventory,
            orders,
            restaurant,
            notifier,
        }
    }

    /// Process one caller utterance and produce the reply.
    ///
    /// The user turn and the final assistant reply are both appended to
    /// the history; intent classification runs on the raw utterance, not
    /// on anything the AI produced.
    pub async fn take_turn(
        &self,
        caller: &str,
        history: &mut ConversationHistory,
        utterance: &str,
    ) -> TurnReply {
        history.push(Turn::user(utterance));

        let ai_reply = match self.llm.complete(history.turns()).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(caller, model = self.llm.model_name(), "AI reply failed: {}", e);
                prompts::FALLBACK_REPLY.to_string()
            }
        };

        let reply = match intent::classify(utterance) {
            Intent::Order => self.handle_order(caller, utterance, ai_reply).await,
            Intent::Reservation => self.handle_reservation(caller, utterance, ai_reply).await,
            Intent::Other => ai_reply,
        };

        history.push(Turn::assistant(reply.clone()));

        let end_call = should_end_call(utterance, &reply);
        if end_call {
            tracing::info!(caller, "Call ending");
        }

        TurnReply {
            text: reply,
            end_call,
        }
    }

    /// Order flow: a closing phrase commits the cart, otherwise any
    /// mentioned dishes are appended. Closing is checked first so "that's
    /// all" never re-adds a dish it happens to contain.
    async fn handle_order(&self, caller: &str, utterance: &str, ai_reply: String) -> String {
        if intent::is_closing_phrase(utterance) {
            return match self.orders.commit_order(caller) {
                Some(items) => {
                    self.dispatch(caller, Notification::Order { items }).await;
                    ai_reply + "\nYour order is confirmed! We will have it ready soon."
                }
                None => ai_reply + "\nIt seems you haven't added any items yet.",
            };
        }

        let found = intent::match_dishes(&self.restaurant.menu, utterance);
        if found.is_empty() {
            return ai_reply;
        }
        self.orders.append_items(caller, &found);
        format!(
            "{}\nI've added {} to your order. Say 'done' when finished.",
            ai_reply,
            found.join(", ")
        )
    }

    /// Reservation flow: with both date and time present, attempt the
    /// ledger reservation and report the outcome. Ledger refusals are
    /// ordinary replies, not errors.
    async fn handle_reservation(&self, caller: &str, utterance: &str, ai_reply: String) -> String {
        let Some(request) = intent::extract_reservation(utterance) else {
            return ai_reply;
        };

        match self
            .inventory
            .reserve(&request.date, &request.time, request.party_size)
        {
            Ok(confirmation) => {
                self.dispatch(
                    caller,
                    Notification::Reservation {
                        date: confirmation.date.clone(),
                        time: confirmation.time.clone(),
                        party_size: confirmation.party_size,
                    },
                )
                .await;
                format!(
                    "{}\nI've reserved a table for {} on {} at {}.",
                    ai_reply, confirmation.party_size, confirmation.date, confirmation.time
                )
            }
            Err(LedgerError::FullyBooked { date, time }) => {
                format!("{}\nSorry, we're fully booked on {} at {}.", ai_reply, date, time)
            }
            Err(LedgerError::InsufficientSeats { remaining }) => {
                format!(
                    "{}\nWe only have {} seats left for that time.",
                    ai_reply, remaining
                )
            }
            Err(LedgerError::NotBookable { date, time }) => {
                format!(
                    "{}\nSorry, we don't take reservations on {} at {}.",
                    ai_reply, date, time
                )
            }
        }
    }

    /// Deliver a confirmation. The ledger mutation has already committed;
    /// a delivery failure is logged and the turn proceeds unchanged.
    async fn dispatch(&self, caller: &str, notification: Notification) {
        if let Err(e) = self.notifier.notify(caller, &notification).await {
            tracing::warn!(caller, "Notification delivery failed: {}", e);
        }
    }
}

/// The call ends when the caller says goodbye or the reply itself closes
/// the conversation.
fn should_end_call(utterance: &str, reply: &str) -> bool {
    if intent::is_goodbye(utterance) {
        return true;
    }
    let reply_lower = reply.to_lowercase();
    reply_lower.contains("thank you for calling") || reply_lower.contains("goodbye")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sofia_core::Result;

    struct CannedLlm {
        reply: &'static str,
    }

    #[async_trait]
    impl LanguageModel for CannedLlm {
        async fn complete(&self, _history: &[Turn]) -> Result<String> {
            Ok(self.reply.to_string())
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LanguageModel for FailingLlm {
        async fn complete(&self, _history: &[Turn]) -> Result<String> {
            Err(sofia_core::Error::Llm("boom".to_string()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, Notification)>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(&self, recipient: &str, notification: &Notification) -> Result<()> {
            self.sent
                .lock()
                .push((recipient.to_string(), notification.clone()));
            Ok(())
        }
    }

    fn engine_with(
        reply: &'static str,
    ) -> (TurnEngine, Arc<InventoryLedger>, Arc<OrderBook>, Arc<RecordingSink>) {
        let restaurant = Arc::new(RestaurantConfig::default());
        let inventory = Arc::new(InventoryLedger::from_schedule(&restaurant.schedule));
        let orders = Arc::new(OrderBook::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = TurnEngine::new(
            Arc::new(CannedLlm { reply }),
            Arc::clone(&inventory),
            Arc::clone(&orders),
            restaurant,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
        );
        (engine, inventory, orders, sink)
    }

    const CALLER: &str = "+15551234567";

    #[tokio::test]
    async fn test_order_items_appended() {
        let (engine, _, orders, _) = engine_with("Great choice!");
        let mut history = ConversationHistory::new();

        let reply = engine
            .take_turn(CALLER, &mut history, "I'd like to order a Tiramisu and Red Wine")
            .await;

        assert!(reply.text.contains("I've added Tiramisu, Red Wine to your order"));
        assert!(!reply.end_call);
        assert_eq!(orders.items(CALLER), vec!["Tiramisu", "Red Wine"]);
    }

    #[tokio::test]
    async fn test_closing_phrase_commits_instead_of_appending() {
        let (engine, _, orders, sink) = engine_with("Anything else?");
        orders.append_items(CALLER, &["Tiramisu".to_string()]);
        let mut history = ConversationHistory::new();

        let reply = engine
            .take_turn(CALLER, &mut history, "that's all for my order")
            .await;

        assert!(reply.text.contains("Your order is confirmed!"));
        assert!(orders.items(CALLER).is_empty());

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            Notification::Order {
                items: vec!["Tiramisu".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_done_with_empty_cart() {
        let (engine, _, _, sink) = engine_with("Sure.");
        let mut history = ConversationHistory::new();

        let reply = engine.take_turn(CALLER, &mut history, "done with my order").await;

        assert!(reply.text.contains("haven't added any items yet"));
        assert!(sink.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reservation_reduces_seats_then_refuses() {
        let (engine, inventory, _, sink) = engine_with("Let me check.");
        let mut history = ConversationHistory::new();

        let first = engine
            .take_turn(
                CALLER,
                &mut history,
                "Book a table on 2025-02-01 at 19:00 for 3 people",
            )
            .await;
        assert!(first.text.contains("I've reserved a table for 3 on 2025-02-01 at 19:00."));
        assert_eq!(inventory.remaining("2025-02-01", "19:00"), Some(2));
        assert_eq!(sink.sent.lock().len(), 1);

        let second = engine
            .take_turn(
                CALLER,
                &mut history,
                "Book a table on 2025-02-01 at 19:00 for 3 people",
            )
            .await;
        assert!(second.text.contains("We only have 2 seats left for that time."));
        assert_eq!(inventory.remaining("2025-02-01", "19:00"), Some(2));
        assert_eq!(sink.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_fully_booked_slot() {
        let (engine, _, _, _) = engine_with("One moment.");
        let mut history = ConversationHistory::new();

        let reply = engine
            .take_turn(CALLER, &mut history, "Reserve 2025-02-02 at 19:00 for 2 people")
            .await;
        assert!(reply.text.contains("Sorry, we're fully booked on 2025-02-02 at 19:00."));
    }

    #[tokio::test]
    async fn test_partial_reservation_passes_through() {
        let (engine, inventory, _, _) = engine_with("What date did you have in mind?");
        let mut history = ConversationHistory::new();

        let reply = engine
            .take_turn(CALLER, &mut history, "I'd like to book a table at 19:00")
            .await;
        assert_eq!(reply.text, "What date did you have in mind?");
        assert_eq!(inventory.remaining("2025-02-01", "19:00"), Some(5));
    }

    #[tokio::test]
    async fn test_llm_failure_degrades_to_fallback() {
        let restaurant = Arc::new(RestaurantConfig::default());
        let engine = TurnEngine::new(
            Arc::new(FailingLlm),
            Arc::new(InventoryLedger::from_schedule(&restaurant.schedule)),
            Arc::new(OrderBook::new()),
            restaurant,
            Arc::new(RecordingSink::default()),
        );
        let mut history = ConversationHistory::new();

        let reply = engine.take_turn(CALLER, &mut history, "hello there").await;
        assert_eq!(reply.text, prompts::FALLBACK_REPLY);
        assert!(!reply.end_call);
    }

    #[tokio::test]
    async fn test_goodbye_ends_call() {
        let (engine, _, _, _) = engine_with("It was a pleasure.");
        let mut history = ConversationHistory::new();

        let reply = engine.take_turn(CALLER, &mut history, "ok bye").await;
        assert!(reply.end_call);
    }

    #[tokio::test]
    async fn test_reply_closing_phrase_ends_call() {
        let (engine, _, _, _) = engine_with("Thank you for calling, have a great evening.");
        let mut history = ConversationHistory::new();

        let reply = engine.take_turn(CALLER, &mut history, "nothing else").await;
        assert!(reply.end_call);
    }

    #[tokio::test]
    async fn test_history_records_both_turns() {
        let (engine, _, _, _) = engine_with("Of course.");
        let mut history = ConversationHistory::with_system("You are Sofia.");

        engine.take_turn(CALLER, &mut history, "hello").await;

        let turns = history.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content, "hello");
        assert_eq!(turns[2].content, "Of course.");
    }
}
