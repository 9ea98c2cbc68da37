//! Conversational turn logic
//!
//! `intent` classifies an utterance and pulls out reservation and order
//! fields. `engine` runs one full turn: AI reply, ledger operation,
//! caller-facing message, termination decision.

pub mod engine;
pub mod intent;

pub use engine::{TurnEngine, TurnReply};
pub use intent::{
    classify, extract_reservation, is_closing_phrase, is_goodbye, match_dishes, Intent,
    ReservationRequest,
};
