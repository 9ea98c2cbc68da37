//! Persona instructions and canned caller-facing lines

use crate::restaurant::RestaurantConfig;

/// Greeting spoken when a call is answered
pub const GREETING: &str =
    "Welcome to Fine Dining Restaurant. This is Sofia, your virtual hostess.";

/// Prompt spoken before gathering the caller's next utterance
pub const GATHER_PROMPT: &str =
    "How may I assist you today? You can reserve a table or place a takeout order.";

/// Spoken when the gather times out without any input
pub const NO_INPUT_GOODBYE: &str = "I did not receive any input. Goodbye.";

/// Spoken when a transcript arrives empty or unintelligible
pub const UNINTELLIGIBLE_GOODBYE: &str = "Sorry, I didn't catch that. Goodbye.";

/// Fixed fallback when the AI capability fails; never fatal to the call
pub const FALLBACK_REPLY: &str = "I'm sorry, I'm having trouble understanding.";

/// Appended to the final reply when the hostess hangs up
pub const FAREWELL: &str = "Thank you for calling. Goodbye!";

/// Build the persona system message from the live menu.
///
/// The AI only ever sees the real catalog, so it cannot invent dishes.
pub fn system_message(restaurant: &RestaurantConfig) -> String {
    let join = |name: &str| {
        restaurant
            .menu
            .category(name)
            .map(|c| c.dishes.join(", "))
            .unwrap_or_default()
    };

    format!(
        "I am Sofia, an AI restaurant hostess. I handle reservations and takeout orders.\n\
         \n\
         Real Menu:\n\
         Appetizers: {}\n\
         Mains: {}\n\
         Desserts: {}\n\
         Drinks: {}\n\
         \n\
         If a requested reservation time is '0 seats', we're fully booked.\n\
         If seats > 0, we can book. For orders, add items until the user says 'done'.",
        join("appetizers"),
        join("main_courses"),
        join("desserts"),
        join("drinks"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restaurant::RestaurantConfig;

    #[test]
    fn test_system_message_lists_real_menu() {
        let msg = system_message(&RestaurantConfig::default());
        assert!(msg.contains("Bruschetta, Caesar Salad, Mozzarella Sticks"));
        assert!(msg.contains("Tiramisu"));
        assert!(msg.contains("Sofia"));
    }
}
