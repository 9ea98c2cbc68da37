//! Core traits and types for the phone hostess
//!
//! This crate provides foundational types used across all other crates:
//! - Conversation history (append-only, role-tagged turns)
//! - Telephony audio payload framing (base64 mu-law frames)
//! - Capability traits for pluggable backends (LLM, notifications)
//! - Error types

pub mod audio;
pub mod conversation;
pub mod error;
pub mod traits;

pub use audio::{decode_media_payload, encode_media_payload};
pub use conversation::{ConversationHistory, Turn, TurnRole};
pub use error::{Error, Result};
pub use traits::{LanguageModel, Notification, NotificationSink};
