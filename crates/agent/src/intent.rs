//! Keyword intent classification and slot extraction
//!
//! Everything here is a pure function of the raw utterance (plus the menu
//! for dish matching), so it is trivially testable and carries no session
//! state.

use once_cell::sync::Lazy;
use regex::Regex;

use sofia_config::MenuCatalog;

/// Caller intent for one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Takeout order flow
    Order,
    /// Table reservation flow
    Reservation,
    /// Neither; plain conversation
    Other,
}

const ORDER_KEYWORDS: &[&str] = &["order", "takeout", "pickup", "pick up"];
const RESERVATION_KEYWORDS: &[&str] = &["reserve", "book", "table"];
const CLOSING_PHRASES: &[&str] = &["done", "that's all", "finished"];
const GOODBYE_KEYWORDS: &[&str] = &["bye", "exit", "quit"];

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(20\d{2}-\d{2}-\d{2})\b").expect("valid date regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{2}:\d{2})\b").expect("valid time regex"));
static PARTY_FOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfor\s+(\d+)\s*(people|guests|seat|seats)\b").expect("valid party regex")
});
static PARTY_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\s*(people|guests|seat|seats)\b").expect("valid party regex"));

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Classify one utterance by keyword membership.
///
/// Order keywords are checked before reservation keywords; an utterance
/// containing both ("order a table...") is an Order. The tie-break is
/// intentional, not incidental.
pub fn classify(utterance: &str) -> Intent {
    let lower = utterance.to_lowercase();
    if contains_any(&lower, ORDER_KEYWORDS) {
        Intent::Order
    } else if contains_any(&lower, RESERVATION_KEYWORDS) {
        Intent::Reservation
    } else {
        Intent::Other
    }
}

/// Extracted reservation fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub date: String,
    pub time: String,
    pub party_size: u32,
}

/// Pull (date, time, party size) out of an utterance.
///
/// Date is `YYYY-MM-DD` with a "20" year prefix, time is zero-padded
/// `HH:MM`. Party size prefers an explicit "for N people" phrasing over a
/// bare "N people", and defaults to 2 when neither appears. Returns `None`
/// unless both date and time are present; a partial request makes no
/// ledger attempt this turn.
pub fn extract_reservation(utterance: &str) -> Option<ReservationRequest> {
    let date = DATE_RE.captures(utterance)?.get(1)?.as_str().to_string();
    let time = TIME_RE.captures(utterance)?.get(1)?.as_str().to_string();

    let lower = utterance.to_lowercase();
    let party_size = PARTY_FOR_RE
        .captures(&lower)
        .or_else(|| PARTY_BARE_RE.captures(&lower))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(2);

    Some(ReservationRequest {
        date,
        time,
        party_size,
    })
}

/// Whether the utterance closes the order ("done", "that's all",
/// "finished"). Checked before dish matching, so a closing phrase that
/// also names a dish still commits instead of appending.
pub fn is_closing_phrase(utterance: &str) -> bool {
    contains_any(&utterance.to_lowercase(), CLOSING_PHRASES)
}

/// Whether the caller said goodbye
pub fn is_goodbye(utterance: &str) -> bool {
    contains_any(&utterance.to_lowercase(), GOODBYE_KEYWORDS)
}

/// Every catalog dish named in the utterance, in catalog order.
///
/// Case-insensitive substring match; no de-duplication (one mention of
/// "Tiramisu" in an utterance matches once, but it can be ordered again
/// on a later turn).
pub fn match_dishes(menu: &MenuCatalog, utterance: &str) -> Vec<String> {
    let lower = utterance.to_lowercase();
    menu.dishes()
        .filter(|dish| lower.contains(&dish.to_lowercase()))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sofia_config::RestaurantConfig;

    #[test]
    fn test_classify_order_keywords() {
        assert_eq!(classify("I'd like to ORDER takeout"), Intent::Order);
        assert_eq!(classify("can I pick up some food"), Intent::Order);
    }

    #[test]
    fn test_classify_reservation_keywords() {
        assert_eq!(classify("I want to book a table"), Intent::Reservation);
        assert_eq!(classify("Can you reserve something"), Intent::Reservation);
    }

    #[test]
    fn test_order_wins_when_both_match() {
        assert_eq!(classify("I'd like to order a table side dish"), Intent::Order);
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify("what are your opening hours"), Intent::Other);
    }

    #[test]
    fn test_extract_full_reservation() {
        let req = extract_reservation("Book 2025-02-01 at 19:00 for 3 people").unwrap();
        assert_eq!(
            req,
            ReservationRequest {
                date: "2025-02-01".to_string(),
                time: "19:00".to_string(),
                party_size: 3,
            }
        );
    }

    #[test]
    fn test_party_size_defaults_to_two() {
        let req = extract_reservation("A table on 2025-02-01 at 20:00 please").unwrap();
        assert_eq!(req.party_size, 2);
    }

    #[test]
    fn test_for_phrasing_preferred_over_bare() {
        // "4 seats" appears first but the "for 3 people" phrasing wins
        let req =
            extract_reservation("We are 4 seats short, book for 3 people on 2025-02-01 at 19:00")
                .unwrap();
        assert_eq!(req.party_size, 3);
    }

    #[test]
    fn test_missing_date_or_time_yields_none() {
        assert!(extract_reservation("book a table at 19:00 for 2 people").is_none());
        assert!(extract_reservation("book a table on 2025-02-01 for 2 people").is_none());
    }

    #[test]
    fn test_closing_phrases() {
        assert!(is_closing_phrase("that's all, thanks"));
        assert!(is_closing_phrase("I'm DONE"));
        assert!(!is_closing_phrase("add a tiramisu"));
    }

    #[test]
    fn test_goodbye_detection() {
        assert!(is_goodbye("ok bye now"));
        assert!(!is_goodbye("one more thing"));
    }

    #[test]
    fn test_match_dishes_case_insensitive_catalog_order() {
        let menu = RestaurantConfig::default().menu;
        let items = match_dishes(&menu, "a TIRAMISU and some bruschetta please");
        assert_eq!(items, vec!["Bruschetta", "Tiramisu"]);
    }

    #[test]
    fn test_match_dishes_none() {
        let menu = RestaurantConfig::default().menu;
        assert!(match_dishes(&menu, "just water from the tap").is_empty());
    }
}
