//! Best-effort operational alerts.
//!
//! Cycle failures and lifecycle events are pushed to a configured
//! webhook as a small JSON payload. Notifications are fire-and-forget:
//! a failed delivery is logged and never propagated into the sync path.

use serde::Serialize;

#[derive(Serialize)]
struct NotifyPayload<'a> {
    text: &'a str,
}

/// Webhook alert sender. Construct once and share.
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    env_name: String,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>, env_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            env_name: env_name.into(),
        }
    }

    /// A notifier that drops every message (tests, local runs).
    pub fn disabled() -> Self {
        Self::new(None, "dev")
    }

    /// Send `message` to the webhook, tagged with the environment name.
    /// No-op when no webhook is configured.
    pub async fn send(&self, message: &str) {
        let Some(url) = &self.webhook_url else {
            return;
        };
        let text = format!("[{}]: {}", self.env_name, message);
        let result = self
            .client
            .post(url)
            .json(&NotifyPayload { text: &text })
            .send()
            .await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(status = resp.status().as_u16(), "notification rejected");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to send notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_notifier_is_a_noop() {
        // Must return immediately without any network attempt.
        Notifier::disabled().send("hello").await;
    }

    #[test]
    fn payload_shape() {
        let payload = NotifyPayload { text: "[dev]: boom" };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"text":"[dev]: boom"}"#);
    }
}
