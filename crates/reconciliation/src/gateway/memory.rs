use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use common::CorrelationRef;

use super::{PaymentGateway, PaymentRequest, Verification};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    initiated: Vec<PaymentRequest>,
    verifications: HashMap<String, Verification>,
    verify_calls: usize,
    fail_on_initiate: bool,
}

/// Scripted gateway for tests and local runs.
///
/// Every reference verifies as pending until a result is set for it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the result later verifications of `reference` return.
    pub fn set_verification(&self, reference: &CorrelationRef, verification: Verification) {
        self.state()
            .verifications
            .insert(reference.to_string(), verification);
    }

    /// Configures the gateway to refuse checkouts.
    pub fn set_fail_on_initiate(&self, fail: bool) {
        self.state().fail_on_initiate = fail;
    }

    /// Returns the checkouts opened so far.
    pub fn initiated(&self) -> Vec<PaymentRequest> {
        self.state().initiated.clone()
    }

    /// Returns how many times `verify` was called.
    pub fn verify_calls(&self) -> usize {
        self.state().verify_calls
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn initiate(&self, request: &PaymentRequest) -> Result<String, GatewayError> {
        let mut state = self.state();
        if state.fail_on_initiate {
            return Err(GatewayError::RequestFailed("gateway unreachable".to_string()));
        }
        state.initiated.push(request.clone());
        Ok(format!("https://checkout.example.test/pay/{}", request.reference))
    }

    async fn verify(&self, reference: &CorrelationRef) -> Verification {
        let mut state = self.state();
        state.verify_calls += 1;
        state
            .verifications
            .get(reference.as_str())
            .cloned()
            .unwrap_or_else(Verification::pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::VerificationStatus;
    use common::EntityId;
    use domain::{Currency, Customer, Money, PaymentTarget};

    #[tokio::test]
    async fn test_scripted_verification() {
        let gateway = InMemoryPaymentGateway::new();
        let reference = CorrelationRef::parse("ORD-1").unwrap();

        assert_eq!(
            gateway.verify(&reference).await.status,
            VerificationStatus::Pending
        );

        gateway.set_verification(
            &reference,
            Verification::success(Money::from_cents(500), Currency::parse("NGN").unwrap()),
        );
        assert_eq!(
            gateway.verify(&reference).await.status,
            VerificationStatus::Success
        );
        assert_eq!(gateway.verify_calls(), 2);
    }

    #[tokio::test]
    async fn test_initiate_and_failure_switch() {
        let gateway = InMemoryPaymentGateway::new();
        let request = PaymentRequest {
            reference: CorrelationRef::parse("ORD-1").unwrap(),
            amount: Money::from_cents(500),
            currency: Currency::parse("NGN").unwrap(),
            customer: Customer::new("ada@example.com", "Ada"),
            target: PaymentTarget::Order(EntityId::new()),
        };

        let url = gateway.initiate(&request).await.unwrap();
        assert!(url.ends_with("/ORD-1"));
        assert_eq!(gateway.initiated().len(), 1);

        gateway.set_fail_on_initiate(true);
        assert!(gateway.initiate(&request).await.is_err());
        assert_eq!(gateway.initiated().len(), 1);
    }
}
