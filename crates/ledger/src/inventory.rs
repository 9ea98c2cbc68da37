//! Seat inventory with per-slot atomic reservation

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use sofia_config::ScheduleSlot;

use crate::LedgerError;

/// Key for one bookable slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    date: String,
    time: String,
}

/// Confirmation returned by a successful reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationConfirmation {
    pub date: String,
    pub time: String,
    pub party_size: u32,
}

/// Remaining seats per (date, time) slot.
///
/// A key absent from the table is unbookable, which is distinct from a
/// present key with zero seats (fully booked).
pub struct InventoryLedger {
    slots: DashMap<SlotKey, u32>,
}

impl InventoryLedger {
    /// Seed the inventory from the startup schedule
    pub fn from_schedule(schedule: &[ScheduleSlot]) -> Self {
        let slots = DashMap::new();
        for slot in schedule {
            slots.insert(
                SlotKey {
                    date: slot.date.clone(),
                    time: slot.time.clone(),
                },
                slot.seats,
            );
        }
        Self { slots }
    }

    /// Atomically reserve `party_size` seats on (date, time).
    ///
    /// The check and the decrement happen under the slot's lock, so
    /// concurrent reservations against one slot are linearizable: the sum
    /// of granted party sizes never exceeds the initial seat count.
    pub fn reserve(
        &self,
        date: &str,
        time: &str,
        party_size: u32,
    ) -> Result<ReservationConfirmation, LedgerError> {
        let key = SlotKey {
            date: date.to_string(),
            time: time.to_string(),
        };

        let mut entry = self.slots.get_mut(&key).ok_or_else(|| LedgerError::NotBookable {
            date: date.to_string(),
            time: time.to_string(),
        })?;

        let remaining = *entry;
        if remaining == 0 {
            return Err(LedgerError::FullyBooked {
                date: date.to_string(),
                time: time.to_string(),
            });
        }
        if remaining < party_size {
            return Err(LedgerError::InsufficientSeats { remaining });
        }

        *entry = remaining - party_size;
        metrics::counter!("sofia_reservations_total").increment(1);
        tracing::info!(
            date,
            time,
            party_size,
            remaining = *entry,
            "Reserved seats"
        );

        Ok(ReservationConfirmation {
            date: date.to_string(),
            time: time.to_string(),
            party_size,
        })
    }

    /// Remaining seats for a slot, if it exists
    pub fn remaining(&self, date: &str, time: &str) -> Option<u32> {
        self.slots
            .get(&SlotKey {
                date: date.to_string(),
                time: time.to_string(),
            })
            .map(|entry| *entry)
    }
}
