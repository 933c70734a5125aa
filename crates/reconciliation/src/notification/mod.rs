//! Notification dispatcher.
//!
//! Sends the customer's payment success or failure email at most once per
//! payment session. The session holds one guard per email kind: a sender
//! first claims the guard, then sends, then marks it sent. A failed send
//! releases the claim so a later reconcile can try again.

mod mailer;
pub mod templates;

pub use mailer::{HttpMailer, InMemoryMailer, LogMailer};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::CorrelationRef;
use document_store::DocumentStore;
use domain::{Mutation, NotificationKind, PaymentSession, Repository};
use serde::Serialize;

use crate::error::NotificationError;

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Trait for outbound email transports.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers a message to the transport.
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

#[async_trait]
impl<T: Mailer + ?Sized> Mailer for std::sync::Arc<T> {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        (**self).send(message).await
    }
}

/// What happened to a notification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The email was sent by this call.
    Sent,

    /// The email had already been sent.
    AlreadySent,

    /// Another caller holds the claim and is sending it.
    InProgress,

    /// Sending failed; the claim was released.
    Failed(String),
}

/// How long a claim protects an in-flight send before it is considered abandoned.
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 300;

/// Sends payment outcome emails exactly once per session.
pub struct NotificationDispatcher<S, M> {
    sessions: Repository<S, PaymentSession>,
    mailer: M,
    lease: Duration,
}

impl<S: Clone, M: Clone> Clone for NotificationDispatcher<S, M> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            mailer: self.mailer.clone(),
            lease: self.lease,
        }
    }
}

impl<S, M> NotificationDispatcher<S, M>
where
    S: DocumentStore,
    M: Mailer,
{
    /// Creates a dispatcher with the default claim lease.
    pub fn new(store: S, mailer: M) -> Self {
        Self {
            sessions: Repository::new(store),
            mailer,
            lease: Duration::seconds(DEFAULT_CLAIM_LEASE_SECS),
        }
    }

    /// Overrides the claim lease.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Sends the email for `kind` unless it was already sent.
    ///
    /// Never returns an error: store and transport failures are logged and
    /// reported as [`NotifyOutcome::Failed`].
    #[tracing::instrument(skip(self), fields(correlation_ref = %reference, kind = kind.as_str()))]
    pub async fn notify_payment_outcome(
        &self,
        reference: &CorrelationRef,
        kind: NotificationKind,
    ) -> NotifyOutcome {
        let lease = self.lease;
        let claim = self
            .sessions
            .update_with(reference.as_str(), |session| {
                if session.email_sent(kind) {
                    return Ok(Mutation::Unchanged(NotifyOutcome::AlreadySent));
                }
                if !session.try_claim(kind, Utc::now(), lease) {
                    return Ok(Mutation::Unchanged(NotifyOutcome::InProgress));
                }
                Ok(Mutation::Changed(NotifyOutcome::Sent))
            })
            .await;

        let session = match claim {
            Ok(result) if result.outcome == NotifyOutcome::Sent => result.entity,
            Ok(result) => {
                tracing::debug!(outcome = ?result.outcome, "notification not sent by this call");
                return result.outcome;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not claim notification");
                metrics::counter!("notifications_failed_total").increment(1);
                return NotifyOutcome::Failed(e.to_string());
            }
        };

        let message = templates::payment_outcome(&session, kind);
        let send_result = if session.customer().has_valid_email() {
            self.mailer.send(&message).await
        } else {
            Err(NotificationError::InvalidRecipient(message.to.clone()))
        };

        match send_result {
            Ok(()) => {
                let marked = self
                    .sessions
                    .update_with(reference.as_str(), |session| {
                        session.mark_sent(kind);
                        Ok(Mutation::Changed(()))
                    })
                    .await;
                if let Err(e) = marked {
                    // The email went out; a stale claim expires after the lease.
                    tracing::warn!(error = %e, "email sent but sent flag not persisted");
                }
                metrics::counter!("notifications_sent_total", "outcome" => kind.as_str())
                    .increment(1);
                tracing::info!(to = %message.to, "payment notification sent");
                NotifyOutcome::Sent
            }
            Err(e) => {
                tracing::warn!(error = %e, "payment notification failed");
                metrics::counter!("notifications_failed_total").increment(1);
                let released = self
                    .sessions
                    .update_with(reference.as_str(), |session| {
                        session.release_claim(kind);
                        Ok(Mutation::Changed(()))
                    })
                    .await;
                if let Err(release_err) = released {
                    tracing::warn!(error = %release_err, "could not release notification claim");
                }
                NotifyOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::EntityId;
    use document_store::InMemoryDocumentStore;
    use domain::{Currency, Customer, Money, PaymentTarget};

    async fn setup(email: &str) -> (InMemoryDocumentStore, CorrelationRef) {
        let store = InMemoryDocumentStore::new();
        let reference = CorrelationRef::parse("ORD-n1").unwrap();
        let mut session = PaymentSession::new(
            reference.clone(),
            PaymentTarget::Order(EntityId::new()),
            Money::from_cents(1000),
            Currency::parse("NGN").unwrap(),
            Customer::new(email, "Ada"),
            Utc::now(),
        );
        Repository::new(store.clone())
            .insert(&mut session)
            .await
            .unwrap();
        (store, reference)
    }

    #[tokio::test]
    async fn test_sends_once() {
        let (store, reference) = setup("ada@example.com").await;
        let mailer = InMemoryMailer::new();
        let dispatcher = NotificationDispatcher::new(store.clone(), mailer.clone());

        let first = dispatcher
            .notify_payment_outcome(&reference, NotificationKind::PaymentSuccess)
            .await;
        let second = dispatcher
            .notify_payment_outcome(&reference, NotificationKind::PaymentSuccess)
            .await;

        assert_eq!(first, NotifyOutcome::Sent);
        assert_eq!(second, NotifyOutcome::AlreadySent);
        assert_eq!(mailer.sent().len(), 1);

        let repo: Repository<_, PaymentSession> = Repository::new(store);
        let session = repo.require(reference.as_str()).await.unwrap();
        assert!(session.email_sent(NotificationKind::PaymentSuccess));
        assert!(!session.email_sent(NotificationKind::PaymentFailure));
    }

    #[tokio::test]
    async fn test_failed_send_can_be_retried() {
        let (store, reference) = setup("ada@example.com").await;
        let mailer = InMemoryMailer::new();
        mailer.fail_next(1);
        let dispatcher = NotificationDispatcher::new(store, mailer.clone());

        let first = dispatcher
            .notify_payment_outcome(&reference, NotificationKind::PaymentFailure)
            .await;
        assert!(matches!(first, NotifyOutcome::Failed(_)));

        let retry = dispatcher
            .notify_payment_outcome(&reference, NotificationKind::PaymentFailure)
            .await;
        assert_eq!(retry, NotifyOutcome::Sent);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_live_claim_blocks_second_sender() {
        let (store, reference) = setup("ada@example.com").await;
        let repo: Repository<_, PaymentSession> = Repository::new(store.clone());
        repo.update_with(reference.as_str(), |s| {
            s.try_claim(NotificationKind::PaymentSuccess, Utc::now(), Duration::minutes(5));
            Ok(Mutation::Changed(()))
        })
        .await
        .unwrap();

        let mailer = InMemoryMailer::new();
        let dispatcher = NotificationDispatcher::new(store, mailer.clone());
        let outcome = dispatcher
            .notify_payment_outcome(&reference, NotificationKind::PaymentSuccess)
            .await;
        assert_eq!(outcome, NotifyOutcome::InProgress);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_without_sending() {
        let (store, reference) = setup("not-an-email").await;
        let mailer = InMemoryMailer::new();
        let dispatcher = NotificationDispatcher::new(store, mailer.clone());

        let outcome = dispatcher
            .notify_payment_outcome(&reference, NotificationKind::PaymentSuccess)
            .await;
        assert!(matches!(outcome, NotifyOutcome::Failed(_)));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_session_fails_softly() {
        let dispatcher =
            NotificationDispatcher::new(InMemoryDocumentStore::new(), InMemoryMailer::new());
        let outcome = dispatcher
            .notify_payment_outcome(
                &CorrelationRef::parse("ORD-missing").unwrap(),
                NotificationKind::PaymentSuccess,
            )
            .await;
        assert!(matches!(outcome, NotifyOutcome::Failed(_)));
    }
}
