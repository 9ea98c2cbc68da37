//! Transaction Ledger
//!
//! Owns the only mutable business state in the process: remaining seats
//! per (date, time) slot, and the per-caller takeout carts. Both tables
//! are process-wide and shared by every call session.
//!
//! Mutations are serialized per key: `reserve` holds the slot's shard
//! lock across its read-check-decrement, so two callers racing for the
//! last seats cannot both win. Independent slots and different callers'
//! carts proceed concurrently. There is no rollback path — once a slot is
//! decremented or a cart committed, downstream failures (e.g. SMS
//! delivery) do not revert the ledger.

pub mod carts;
pub mod inventory;

pub use carts::OrderBook;
pub use inventory::{InventoryLedger, ReservationConfirmation};

use thiserror::Error;

/// Ledger failures. These are expected business outcomes, not faults;
/// the bridge turns them into caller-facing sentences.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The (date, time) key does not exist in the schedule at all.
    #[error("no bookable slot on {date} at {time}")]
    NotBookable { date: String, time: String },

    /// The slot exists but has zero seats remaining.
    #[error("fully booked on {date} at {time}")]
    FullyBooked { date: String, time: String },

    /// The slot has seats, but fewer than requested.
    #[error("only {remaining} seats left")]
    InsufficientSeats { remaining: u32 },
}
