//! Payment gateway adapter.
//!
//! The adapter has two operations: start a hosted checkout and verify a
//! transaction reference. It makes no business decisions; it only turns the
//! gateway's loosely shaped JSON into a [`Verification`].

mod http;
mod memory;
mod payload;

pub use http::HttpPaymentGateway;
pub use memory::InMemoryPaymentGateway;
pub use payload::{GatewayPayload, RawTransaction};

use async_trait::async_trait;
use common::CorrelationRef;
use domain::{Currency, Customer, Money, PaymentTarget};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Status reported by a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Success,
    Failed,
    Pending,
}

/// Normalized verification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub status: VerificationStatus,
    pub amount: Option<Money>,
    pub currency: Option<Currency>,
    pub method: Option<String>,
    pub external_transaction_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Verification {
    /// A pending result carrying no transaction data.
    pub fn pending() -> Self {
        Self {
            status: VerificationStatus::Pending,
            amount: None,
            currency: None,
            method: None,
            external_transaction_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// A successful payment of `amount`.
    pub fn success(amount: Money, currency: Currency) -> Self {
        Self {
            status: VerificationStatus::Success,
            amount: Some(amount),
            currency: Some(currency),
            ..Self::pending()
        }
    }

    /// A payment the gateway declared failed.
    pub fn failed() -> Self {
        Self {
            status: VerificationStatus::Failed,
            ..Self::pending()
        }
    }

    /// Sets the payment method reported by the gateway.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the gateway's own transaction id.
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_transaction_id = Some(id.into());
        self
    }
}

/// Everything the gateway needs to open a hosted checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub reference: CorrelationRef,
    pub amount: Money,
    pub currency: Currency,
    pub customer: Customer,
    pub target: PaymentTarget,
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted checkout and returns the URL the customer is sent to.
    async fn initiate(&self, request: &PaymentRequest) -> Result<String, GatewayError>;

    /// Verifies a transaction reference.
    ///
    /// Never fails: network errors and unreadable responses are reported as
    /// pending so that callers simply try again later.
    async fn verify(&self, reference: &CorrelationRef) -> Verification;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for std::sync::Arc<T> {
    async fn initiate(&self, request: &PaymentRequest) -> Result<String, GatewayError> {
        (**self).initiate(request).await
    }

    async fn verify(&self, reference: &CorrelationRef) -> Verification {
        (**self).verify(reference).await
    }
}
