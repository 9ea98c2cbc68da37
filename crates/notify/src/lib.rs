//! Notification Dispatcher
//!
//! Fire-and-forget confirmation delivery. The ledger mutation has already
//! committed by the time a notification is dispatched, so failures here
//! are logged and dropped — never retried, never surfaced to the caller.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use sofia_core::{Notification, NotificationSink};

/// Notification errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("SMS API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Network(err.to_string())
    }
}

impl From<NotifyError> for sofia_core::Error {
    fn from(err: NotifyError) -> Self {
        sofia_core::Error::Notification(err.to_string())
    }
}

/// Render the SMS body for a confirmation
fn message_body(notification: &Notification) -> String {
    match notification {
        Notification::Reservation {
            date,
            time,
            party_size,
        } => format!(
            "Your reservation is confirmed!\nDate: {}\nTime: {}\nParty Size: {}",
            date, time, party_size
        ),
        Notification::Order { items } => format!(
            "Your takeout order is confirmed!\nItems: {}\nWe will have it ready soon.",
            items.join(", ")
        ),
    }
}

/// Twilio SMS sink
pub struct TwilioSms {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    endpoint: String,
}

impl TwilioSms {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            endpoint: "https://api.twilio.com".to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.endpoint, self.account_sid
        )
    }
}

#[async_trait]
impl NotificationSink for TwilioSms {
    async fn notify(
        &self,
        recipient: &str,
        notification: &Notification,
    ) -> sofia_core::Result<()> {
        let body = message_body(notification);
        let params = [
            ("To", recipient),
            ("From", self.from_number.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(NotifyError::from)?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api(format!("HTTP {}: {}", status, error)).into());
        }

        tracing::info!(recipient, "Confirmation SMS sent");
        Ok(())
    }
}

/// Log-only sink used when Twilio credentials are absent. Confirmations
/// land in the log instead of being delivered.
#[derive(Default)]
pub struct LogOnlySink;

#[async_trait]
impl NotificationSink for LogOnlySink {
    async fn notify(
        &self,
        recipient: &str,
        notification: &Notification,
    ) -> sofia_core::Result<()> {
        tracing::info!(
            recipient,
            body = %message_body(notification),
            "OWNER NOTIFICATION (SMS not configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_body() {
        let body = message_body(&Notification::Reservation {
            date: "2025-02-01".to_string(),
            time: "19:00".to_string(),
            party_size: 3,
        });
        assert!(body.contains("Date: 2025-02-01"));
        assert!(body.contains("Time: 19:00"));
        assert!(body.contains("Party Size: 3"));
    }

    #[test]
    fn test_order_body_lists_items() {
        let body = message_body(&Notification::Order {
            items: vec!["Tiramisu".to_string(), "Red Wine".to_string()],
        });
        assert!(body.contains("Tiramisu, Red Wine"));
    }

    #[test]
    fn test_messages_url() {
        let sms = TwilioSms::new("AC123", "token", "+15550000000");
        assert_eq!(
            sms.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn test_log_only_sink_always_succeeds() {
        let sink = LogOnlySink;
        let result = sink
            .notify(
                "+15551234567",
                &Notification::Order {
                    items: vec!["Cheesecake".to_string()],
                },
            )
            .await;
        assert!(result.is_ok());
    }
}
