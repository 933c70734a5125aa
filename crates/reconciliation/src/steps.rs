//! Reconciliation step names and per-step outcomes.

use common::CorrelationRef;
use serde::{Deserialize, Serialize};

/// Step name: ask the gateway for the payment status.
pub const STEP_VERIFY_PAYMENT: &str = "verify_payment";

/// Step name: record the verified status on the payment session.
pub const STEP_RECORD_SESSION: &str = "record_session";

/// Step name: move the order or booking to paid.
pub const STEP_MARK_PAID: &str = "mark_paid";

/// Step name: move a pre-payment order or booking to its failure status.
pub const STEP_MARK_FAILED: &str = "mark_failed";

/// Step name: decrement stock for the paid items.
pub const STEP_COMMIT_INVENTORY: &str = "commit_inventory";

/// Step name: return a failed payment's reservation to available stock.
pub const STEP_RELEASE_INVENTORY: &str = "release_inventory";

/// Step name: post the payment ledger entry.
pub const STEP_POST_LEDGER: &str = "post_ledger";

/// Step name: email the customer.
pub const STEP_NOTIFY_CUSTOMER: &str = "notify_customer";

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepStatus {
    /// The step performed its side effect in this call.
    Succeeded,

    /// A previous call already performed the side effect.
    AlreadyApplied,

    /// The step had nothing to do.
    Skipped(String),

    /// The step failed; later steps were still attempted.
    Failed(String),
}

impl StepStatus {
    /// Returns true unless the step failed.
    pub fn is_ok(&self) -> bool {
        !matches!(self, StepStatus::Failed(_))
    }
}

/// One line of a reconciliation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,

    #[serde(flatten)]
    pub status: StepStatus,
}

/// Overall result of verifying the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The gateway confirmed the payment.
    Paid,

    /// The gateway reported a failed payment.
    Failed,

    /// The payment is still pending or the gateway could not be reached.
    RetryLater,
}

/// Aggregate result of one `reconcile` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub transaction_ref: CorrelationRef,
    pub outcome: ReconcileOutcome,
    pub steps: Vec<StepReport>,
}

impl ReconcileReport {
    pub(crate) fn new(transaction_ref: CorrelationRef) -> Self {
        Self {
            transaction_ref,
            outcome: ReconcileOutcome::RetryLater,
            steps: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, step: &str, status: StepStatus) {
        self.steps.push(StepReport {
            step: step.to_string(),
            status,
        });
    }

    /// Returns the status of a step, if it ran.
    pub fn step(&self, name: &str) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|report| report.step == name)
            .map(|report| &report.status)
    }

    /// Returns the names of the steps that failed.
    pub fn failed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|report| !report.status.is_ok())
            .map(|report| report.step.as_str())
            .collect()
    }

    /// Returns true if every step that ran completed without error.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|report| report.status.is_ok())
    }
}
