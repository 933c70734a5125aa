//! Mail transports.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{EmailMessage, Mailer};
use crate::error::NotificationError;

/// Mailer that only logs messages.
///
/// Used when no mail API is configured.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl LogMailer {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "email (log transport)"
        );
        tracing::debug!(body = %message.text, "email body");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryMailerState {
    sent: Vec<EmailMessage>,
    failures_remaining: usize,
}

/// Mailer that records messages, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    state: Arc<Mutex<InMemoryMailerState>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryMailerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes the next `count` sends fail.
    pub fn fail_next(&self, count: usize) {
        self.state().failures_remaining = count;
    }

    /// Returns every message delivered so far.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.state().sent.clone()
    }

    /// Returns the number of delivered messages with the given subject prefix.
    pub fn count_with_subject(&self, prefix: &str) -> usize {
        self.state()
            .sent
            .iter()
            .filter(|m| m.subject.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let mut state = self.state();
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(NotificationError::Transport("simulated outage".to_string()));
        }
        state.sent.push(message.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Mailer posting messages to a transactional email HTTP API.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    /// Creates a mailer posting to `api_url` with a bearer `api_key`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let body = SendBody {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(NotificationError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "ada@example.com".to_string(),
            subject: "Payment received for your order".to_string(),
            html: "<p>hi</p>".to_string(),
            text: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_mailer_failure_budget() {
        let mailer = InMemoryMailer::new();
        mailer.fail_next(1);
        assert!(mailer.send(&message()).await.is_err());
        assert!(mailer.send(&message()).await.is_ok());
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.count_with_subject("Payment received"), 1);
    }

    #[tokio::test]
    async fn test_http_mailer_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(bearer_token("mail_key"))
            .and(body_partial_json(json!({
                "from": "shop@example.com",
                "to": ["ada@example.com"],
                "subject": "Payment received for your order"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(
            format!("{}/emails", server.uri()),
            "mail_key",
            "shop@example.com",
        );
        mailer.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_mailer_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad recipient"))
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(server.uri(), "mail_key", "shop@example.com");
        let err = mailer.send(&message()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Rejected { status: 422, .. }));
    }
}
