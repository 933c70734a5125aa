//! Reconciliation orchestrator.
//!
//! Turns a verified gateway result into the order/booking status change,
//! the inventory commit (or release), the ledger entry and the customer
//! email. Every step is idempotent on its own, so `reconcile` can be called
//! any number of times, concurrently, from the polling redirect and the
//! webhook. A failing step is logged and reported; the remaining steps
//! still run.

use std::time::Instant;

use chrono::Utc;
use common::CorrelationRef;
use document_store::DocumentStore;
use domain::{
    Booking, Currency, Money, Mutation, NewLedgerEntry, NotificationKind, Order, PaymentSession,
    PaymentSnapshot, PaymentStatus, PaymentTarget, Purchase, Repository, Status,
};

use crate::error::{ReconcileError, Result};
use crate::gateway::{PaymentGateway, Verification, VerificationStatus};
use crate::inventory::{InventoryAdjuster, InventoryOutcome};
use crate::ledger::{LedgerPoster, PostResult};
use crate::notification::{Mailer, NotificationDispatcher, NotifyOutcome};
use crate::settings::ReconcileSettings;
use crate::steps::{
    ReconcileOutcome, ReconcileReport, STEP_COMMIT_INVENTORY, STEP_MARK_FAILED, STEP_MARK_PAID,
    STEP_NOTIFY_CUSTOMER, STEP_POST_LEDGER, STEP_RECORD_SESSION, STEP_RELEASE_INVENTORY,
    STEP_VERIFY_PAYMENT, StepStatus,
};

/// Actor recorded on status changes made by reconciliation.
pub const SYSTEM_ACTOR: &str = "system";

/// The payment facts every later step works from.
#[derive(Debug, Clone)]
struct Settlement {
    status: PaymentStatus,
    amount: Money,
    currency: Currency,
    method: Option<String>,
    gateway_transaction_id: Option<String>,
}

/// Drives the reconciliation steps for one payment reference.
pub struct Reconciler<S, G, M> {
    sessions: Repository<S, PaymentSession>,
    gateway: G,
    inventory: InventoryAdjuster<S>,
    ledger: LedgerPoster<S>,
    notifications: NotificationDispatcher<S, M>,
    store: S,
}

impl<S, G, M> Reconciler<S, G, M>
where
    S: DocumentStore + Clone,
    G: PaymentGateway,
    M: Mailer,
{
    /// Creates a new reconciler.
    pub fn new(store: S, gateway: G, mailer: M) -> Self {
        Self {
            sessions: Repository::new(store.clone()),
            gateway,
            inventory: InventoryAdjuster::new(store.clone()),
            ledger: LedgerPoster::new(store.clone()),
            notifications: NotificationDispatcher::new(store.clone(), mailer),
            store,
        }
    }

    /// Replaces the notification dispatcher (e.g. to change the claim lease).
    pub fn with_notifications(mut self, notifications: NotificationDispatcher<S, M>) -> Self {
        self.notifications = notifications;
        self
    }

    /// Returns the payment gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Verifies `reference` with the gateway and applies every side effect.
    ///
    /// Only a missing or unreadable payment session is an error. Failures of
    /// individual steps are reported in the returned [`ReconcileReport`];
    /// calling again completes whatever a previous call left undone.
    #[tracing::instrument(skip(self, settings), fields(correlation_ref = %reference))]
    pub async fn reconcile(
        &self,
        reference: &CorrelationRef,
        settings: &ReconcileSettings,
    ) -> Result<ReconcileReport> {
        metrics::counter!("reconcile_total").increment(1);
        let started = Instant::now();

        let session = self
            .sessions
            .get(reference.as_str())
            .await?
            .ok_or_else(|| ReconcileError::SessionNotFound(reference.to_string()))?;

        let mut report = ReconcileReport::new(reference.clone());
        let verification = self.gateway.verify(reference).await;

        let Some(settlement) = self.settle(&session, &verification, &mut report) else {
            metrics::histogram!("reconcile_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            tracing::info!("payment pending, retry later");
            return Ok(report);
        };

        let settlement = self.record_session(&session, settlement, &mut report).await;

        match (settlement.status, session.target()) {
            (PaymentStatus::Success, PaymentTarget::Order(_)) => {
                self.apply_success::<Order>(&session, &settlement, settings, &mut report)
                    .await;
            }
            (PaymentStatus::Success, PaymentTarget::Booking(_)) => {
                self.apply_success::<Booking>(&session, &settlement, settings, &mut report)
                    .await;
            }
            (_, PaymentTarget::Order(_)) => {
                self.apply_failure::<Order>(&session, &mut report).await;
            }
            (_, PaymentTarget::Booking(_)) => {
                self.apply_failure::<Booking>(&session, &mut report).await;
            }
        }

        for step in report.failed_steps() {
            metrics::counter!("reconcile_step_failures_total", "step" => step.to_string())
                .increment(1);
        }
        metrics::histogram!("reconcile_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            outcome = ?report.outcome,
            failed_steps = ?report.failed_steps(),
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Decides the payment outcome from the verification and the session.
    ///
    /// Returns `None` while the payment is pending.
    fn settle(
        &self,
        session: &PaymentSession,
        verification: &Verification,
        report: &mut ReconcileReport,
    ) -> Option<Settlement> {
        let verified = match verification.status {
            VerificationStatus::Pending => {
                report.record(
                    STEP_VERIFY_PAYMENT,
                    StepStatus::Skipped("payment pending".to_string()),
                );
                report.outcome = ReconcileOutcome::RetryLater;
                return None;
            }
            VerificationStatus::Success => match self.check_amount(session, verification) {
                Ok(()) => PaymentStatus::Success,
                Err(reason) => {
                    tracing::warn!(%reason, "verified payment does not cover the session");
                    PaymentStatus::Failed
                }
            },
            VerificationStatus::Failed => PaymentStatus::Failed,
        };
        report.record(STEP_VERIFY_PAYMENT, StepStatus::Succeeded);

        // A recorded terminal status is final.
        let status = if session.status().is_terminal() && session.status() != verified {
            tracing::warn!(
                recorded = %session.status(),
                verified = %verified,
                "gateway disagrees with the recorded outcome, keeping the recorded one"
            );
            session.status()
        } else {
            verified
        };

        Some(Settlement {
            status,
            amount: verification.amount.unwrap_or(session.amount()),
            currency: verification
                .currency
                .clone()
                .unwrap_or_else(|| session.currency().clone()),
            method: verification.method.clone(),
            gateway_transaction_id: verification.external_transaction_id.clone(),
        })
    }

    fn check_amount(
        &self,
        session: &PaymentSession,
        verification: &Verification,
    ) -> std::result::Result<(), String> {
        if let Some(currency) = &verification.currency {
            if currency != session.currency() {
                return Err(format!(
                    "currency {currency} does not match session currency {}",
                    session.currency()
                ));
            }
        }
        if let Some(amount) = verification.amount {
            if amount < session.amount() {
                return Err(format!(
                    "paid {amount} is less than the session amount {}",
                    session.amount()
                ));
            }
        }
        Ok(())
    }

    async fn record_session(
        &self,
        session: &PaymentSession,
        mut settlement: Settlement,
        report: &mut ReconcileReport,
    ) -> Settlement {
        let now = Utc::now();
        let result = self
            .sessions
            .update_with(session.transaction_ref().as_str(), |s| {
                let changed = s.record_outcome(
                    settlement.status,
                    settlement.gateway_transaction_id.clone(),
                    settlement.method.clone(),
                    now,
                );
                Ok(if changed {
                    Mutation::Changed(true)
                } else {
                    Mutation::Unchanged(false)
                })
            })
            .await;

        match result {
            Ok(updated) => {
                // A concurrent reconcile may have recorded first.
                if updated.entity.status().is_terminal() {
                    settlement.status = updated.entity.status();
                }
                if settlement.method.is_none() {
                    settlement.method = updated.entity.payment_method().map(str::to_string);
                }
                let status = if updated.outcome {
                    StepStatus::Succeeded
                } else {
                    StepStatus::AlreadyApplied
                };
                report.record(STEP_RECORD_SESSION, status);
            }
            Err(e) => {
                tracing::warn!(step = STEP_RECORD_SESSION, error = %e, "step failed");
                report.record(STEP_RECORD_SESSION, StepStatus::Failed(e.to_string()));
            }
        }
        settlement
    }

    async fn apply_success<P: Purchase>(
        &self,
        session: &PaymentSession,
        settlement: &Settlement,
        settings: &ReconcileSettings,
        report: &mut ReconcileReport,
    ) {
        report.outcome = ReconcileOutcome::Paid;
        let reference = session.transaction_ref();
        let target_id = session.target().id();

        let status = self.mark_paid::<P>(session, settlement).await;
        record_step(report, STEP_MARK_PAID, status);

        let status = match self.inventory.commit::<P>(target_id).await {
            Ok(outcome) => inventory_step(outcome),
            Err(e) => StepStatus::Failed(e.to_string()),
        };
        record_step(report, STEP_COMMIT_INVENTORY, status);

        let status = if settings.ledger.auto_posting() {
            let draft = NewLedgerEntry::payment(
                P::KIND,
                target_id,
                settlement.amount,
                settlement.currency.clone(),
                reference.clone(),
            );
            match self
                .ledger
                .post(draft, Some(reference.as_str()), &settings.ledger)
                .await
            {
                Ok(Some(PostResult::Created(_))) => StepStatus::Succeeded,
                Ok(Some(PostResult::Existing(_))) => StepStatus::AlreadyApplied,
                Ok(None) => StepStatus::Skipped("ledger posting disabled".to_string()),
                Err(e) => StepStatus::Failed(e.to_string()),
            }
        } else {
            StepStatus::Skipped("ledger posting disabled".to_string())
        };
        record_step(report, STEP_POST_LEDGER, status);

        let outcome = self
            .notifications
            .notify_payment_outcome(reference, NotificationKind::PaymentSuccess)
            .await;
        record_step(report, STEP_NOTIFY_CUSTOMER, notify_step(outcome));
    }

    async fn apply_failure<P: Purchase>(
        &self,
        session: &PaymentSession,
        report: &mut ReconcileReport,
    ) {
        report.outcome = ReconcileOutcome::Failed;
        let reference = session.transaction_ref();
        let target_id = session.target().id();

        let purchases: Repository<S, P> = Repository::new(self.store.clone());
        let marked = purchases
            .update_with(&target_id.to_string(), |purchase| {
                let current = purchase.status();
                if current == <P::Status as Status>::PAYMENT_FAILED {
                    return Ok(Mutation::Unchanged(StepStatus::AlreadyApplied));
                }
                if current != <P::Status as Status>::INITIAL {
                    return Ok(Mutation::Unchanged(StepStatus::Skipped(format!(
                        "{} is already {current}",
                        P::KIND
                    ))));
                }
                purchase.transition(
                    <P::Status as Status>::PAYMENT_FAILED,
                    SYSTEM_ACTOR,
                    Some(format!("payment {reference} failed")),
                    Utc::now(),
                )?;
                Ok(Mutation::Changed(StepStatus::Succeeded))
            })
            .await;

        let (status, release) = match marked {
            Ok(result) => {
                let current = result.entity.status();
                let release =
                    current != <P::Status as Status>::INITIAL && !current.is_paid_or_later();
                (result.outcome, release)
            }
            Err(e) => (StepStatus::Failed(e.to_string()), false),
        };
        record_step(report, STEP_MARK_FAILED, status);

        let status = if release {
            match self.inventory.release::<P>(target_id).await {
                Ok(outcome) => inventory_step(outcome),
                Err(e) => StepStatus::Failed(e.to_string()),
            }
        } else {
            StepStatus::Skipped("reservation still needed".to_string())
        };
        record_step(report, STEP_RELEASE_INVENTORY, status);

        let outcome = self
            .notifications
            .notify_payment_outcome(reference, NotificationKind::PaymentFailure)
            .await;
        record_step(report, STEP_NOTIFY_CUSTOMER, notify_step(outcome));
    }

    async fn mark_paid<P: Purchase>(
        &self,
        session: &PaymentSession,
        settlement: &Settlement,
    ) -> StepStatus {
        let purchases: Repository<S, P> = Repository::new(self.store.clone());
        let reference = session.transaction_ref();
        let now = Utc::now();
        let snapshot = PaymentSnapshot {
            method: settlement
                .method
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            amount: settlement.amount,
            currency: settlement.currency.clone(),
            paid_at: now,
            gateway_transaction_id: settlement.gateway_transaction_id.clone(),
        };

        let result = purchases
            .update_with(&session.target().id().to_string(), |purchase| {
                if purchase.status().is_paid_or_later() {
                    // Staff may have moved the record to paid before the gateway confirmed.
                    let mut filled = purchase.lifecycle_mut().ensure_paid_at(now);
                    if purchase.payment().is_none() {
                        purchase.set_payment(snapshot.clone());
                        filled = true;
                    }
                    if purchase.transaction_ref().is_none() {
                        purchase.set_transaction_ref(reference.clone());
                        filled = true;
                    }
                    return Ok(if filled {
                        Mutation::Changed(StepStatus::Succeeded)
                    } else {
                        Mutation::Unchanged(StepStatus::AlreadyApplied)
                    });
                }
                purchase.transition(
                    <P::Status as Status>::PAID,
                    SYSTEM_ACTOR,
                    Some(format!("payment {reference} verified")),
                    now,
                )?;
                purchase.set_payment(snapshot.clone());
                if purchase.transaction_ref().is_none() {
                    purchase.set_transaction_ref(reference.clone());
                }
                Ok(Mutation::Changed(StepStatus::Succeeded))
            })
            .await;

        match result {
            Ok(result) => result.outcome,
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }
}

fn record_step(report: &mut ReconcileReport, step: &str, status: StepStatus) {
    if let StepStatus::Failed(reason) = &status {
        tracing::warn!(
            correlation_ref = %report.transaction_ref,
            step,
            %reason,
            "reconciliation step failed"
        );
    }
    report.record(step, status);
}

fn inventory_step(outcome: InventoryOutcome) -> StepStatus {
    match outcome {
        InventoryOutcome::Applied { .. } => StepStatus::Succeeded,
        InventoryOutcome::AlreadyApplied => StepStatus::AlreadyApplied,
        InventoryOutcome::NothingToDo => StepStatus::Skipped("no tracked products".to_string()),
    }
}

fn notify_step(outcome: NotifyOutcome) -> StepStatus {
    match outcome {
        NotifyOutcome::Sent => StepStatus::Succeeded,
        NotifyOutcome::AlreadySent => StepStatus::AlreadyApplied,
        NotifyOutcome::InProgress => StepStatus::Skipped("email being sent by another call".to_string()),
        NotifyOutcome::Failed(reason) => StepStatus::Failed(reason),
    }
}
