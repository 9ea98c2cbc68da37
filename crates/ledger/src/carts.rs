//! Per-caller takeout order carts

use dashmap::DashMap;

/// Open takeout carts, keyed by caller phone number.
///
/// Operations on one caller's cart are serialized by the cart's shard
/// lock; different callers' carts are independent.
#[derive(Default)]
pub struct OrderBook {
    carts: DashMap<String, Vec<String>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append items to the caller's cart. Always succeeds; duplicates are
    /// kept (a caller can order two of the same dish).
    pub fn append_items(&self, caller: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        self.carts
            .entry(caller.to_string())
            .or_default()
            .extend_from_slice(items);
        tracing::debug!(caller, count = items.len(), "Appended items to cart");
    }

    /// Commit the caller's cart: atomically swap a non-empty cart for an
    /// empty one and return the prior contents. An empty or absent cart
    /// commits nothing.
    pub fn commit_order(&self, caller: &str) -> Option<Vec<String>> {
        let mut entry = self.carts.get_mut(caller)?;
        if entry.is_empty() {
            return None;
        }
        let items = std::mem::take(entry.value_mut());
        metrics::counter!("sofia_orders_total").increment(1);
        tracing::info!(caller, count = items.len(), "Committed order");
        Some(items)
    }

    /// Current cart contents (cloned), for rendering order status
    pub fn items(&self, caller: &str) -> Vec<String> {
        self.carts
            .get(caller)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Drop the caller's cart entirely (session teardown)
    pub fn remove(&self, caller: &str) {
        self.carts.remove(caller);
    }
}
