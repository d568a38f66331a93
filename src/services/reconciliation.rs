use crate::database::callback_receipt_repository::NewCallbackReceipt;
use crate::database::error::DatabaseError;
use crate::database::payment_attempt_repository::{AttemptCompletion, AttemptStatus, PaymentAttempt};
use crate::database::store::PaymentRecordStore;
use crate::gateways::gateway::CallbackGateway;
use crate::gateways::types::ParsedCallback;
use crate::services::notification::{NotificationDispatcher, PaymentConfirmation};
use crate::services::order_ref::OrderIdResolver;
use crate::services::orders::OrderService;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Disposition of one callback delivery. Every delivery gets exactly one
/// outcome, and the gateway translates it into the acknowledgement shape the
/// provider expects.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The callback transitioned the attempt into the given terminal state.
    Applied(AttemptStatus),
    /// Redelivery agreeing with a terminal state already recorded.
    Duplicate { status: AttemptStatus },
    /// The callback disagrees with a terminal state already recorded. The
    /// first terminal state wins; the receipt is the evidence for manual
    /// reconciliation.
    Conflict { stored: AttemptStatus },
    /// The MAC did not verify. Nothing downstream of the receipt ran.
    InvalidSignature,
    /// The order reference could not be mapped to an internal order.
    UnresolvedReference,
    /// The reference resolved but no attempt exists for the order.
    Orphaned { order_id: i64 },
    /// Valid signature, known order, but the reported amount differs from
    /// the stored attempt amount.
    AmountMismatch {
        expected: BigDecimal,
        reported: BigDecimal,
    },
}

impl ReconcileOutcome {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied(_) => "applied",
            ReconcileOutcome::Duplicate { .. } => "duplicate",
            ReconcileOutcome::Conflict { .. } => "conflict",
            ReconcileOutcome::InvalidSignature => "invalid_signature",
            ReconcileOutcome::UnresolvedReference => "unresolved_reference",
            ReconcileOutcome::Orphaned { .. } => "orphaned",
            ReconcileOutcome::AmountMismatch { .. } => "amount_mismatch",
        }
    }
}

/// Only storage failures escape the engine. Everything else is a logged
/// rejection with a provider-appropriate acknowledgement, so provider retry
/// machinery is the recovery path exactly when the store is down.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("payment record store unavailable: {0}")]
    Store(#[from] DatabaseError),
}

/// Resolution of a callback against an attempt already in a terminal state.
/// Agreement is a duplicate delivery; disagreement is a conflict and the
/// stored state stands. A "success" redelivery only counts as agreement
/// when its amount also matches the recorded one, so a tampered replay of a
/// settled attempt still surfaces as a conflict.
fn terminal_outcome(
    stored: AttemptStatus,
    incoming_success: bool,
    amount_matches: bool,
) -> ReconcileOutcome {
    let agrees = match stored {
        AttemptStatus::Successful => incoming_success && amount_matches,
        AttemptStatus::Failed => !incoming_success,
        AttemptStatus::Expired | AttemptStatus::Pending => false,
    };
    if agrees {
        ReconcileOutcome::Duplicate { status: stored }
    } else {
        ReconcileOutcome::Conflict { stored }
    }
}

const ORDER_UPDATE_MAX_TRIES: u32 = 3;
const ORDER_UPDATE_BASE_DELAY: Duration = Duration::from_millis(200);

/// The reconciliation core. Sole mutator of payment attempts: verifies,
/// resolves, records, and applies each callback with forward-only status
/// transitions guarded by conditional updates.
pub struct ReconciliationEngine {
    store: Arc<dyn PaymentRecordStore>,
    resolver: OrderIdResolver,
    orders: Arc<dyn OrderService>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn PaymentRecordStore>,
        orders: Arc<dyn OrderService>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let resolver = OrderIdResolver::new(Arc::clone(&store));
        Self {
            store,
            resolver,
            orders,
            notifier,
        }
    }

    /// Process one callback delivery end to end. Re-entrant: redelivering
    /// the same payload is a no-op once the attempt is terminal.
    pub async fn handle_callback(
        &self,
        gateway: &dyn CallbackGateway,
        raw: &[u8],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let provider = gateway.name();
        let payload = gateway.raw_to_json(raw);

        let verification = gateway.verify(raw);
        if !verification.valid {
            warn!(
                provider = provider.as_str(),
                reason = verification.reason.as_deref().unwrap_or("mac mismatch"),
                "callback rejected: invalid signature"
            );
            // Best-effort context so the audit trail stays queryable by
            // order. The payload is untrusted and the delivery is rejected
            // either way, so resolution failures collapse to None here.
            let rejected = gateway.parse(raw).ok();
            let order_id = match &rejected {
                Some(p) => self
                    .resolver
                    .resolve(provider, &p.order_ref)
                    .await
                    .ok()
                    .flatten(),
                None => None,
            };
            self.store
                .append_receipt(NewCallbackReceipt {
                    provider: provider.to_string(),
                    order_id,
                    provider_ref: rejected.as_ref().map(|p| p.order_ref.clone()),
                    result_code: rejected.as_ref().map(|p| p.result_code.clone()),
                    signature_valid: false,
                    payload,
                })
                .await?;
            return Ok(ReconcileOutcome::InvalidSignature);
        }

        let parsed = match gateway.parse(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    provider = provider.as_str(),
                    error = %err,
                    "callback rejected: verified but unparseable"
                );
                self.store
                    .append_receipt(NewCallbackReceipt {
                        provider: provider.to_string(),
                        order_id: None,
                        provider_ref: None,
                        result_code: None,
                        signature_valid: true,
                        payload,
                    })
                    .await?;
                return Ok(ReconcileOutcome::UnresolvedReference);
            }
        };

        let order_id = self.resolver.resolve(provider, &parsed.order_ref).await?;

        // The receipt precedes any state mutation so every delivery,
        // duplicate or not, stays observable in the audit trail.
        self.store
            .append_receipt(NewCallbackReceipt {
                provider: provider.to_string(),
                order_id,
                provider_ref: Some(parsed.order_ref.clone()),
                result_code: Some(parsed.result_code.clone()),
                signature_valid: true,
                payload,
            })
            .await?;

        let order_id = match order_id {
            Some(id) => id,
            None => {
                warn!(
                    provider = provider.as_str(),
                    order_ref = %parsed.order_ref,
                    "callback dropped: order reference did not resolve"
                );
                return Ok(ReconcileOutcome::UnresolvedReference);
            }
        };

        let attempt = match self.store.find_current_attempt(order_id).await? {
            Some(attempt) => attempt,
            None => {
                warn!(
                    provider = provider.as_str(),
                    order_id, "orphaned callback: no payment attempt for order"
                );
                return Ok(ReconcileOutcome::Orphaned { order_id });
            }
        };

        self.reconcile(provider_label(&parsed), order_id, attempt, parsed)
            .await
    }

    async fn reconcile(
        &self,
        provider: &'static str,
        order_id: i64,
        attempt: PaymentAttempt,
        parsed: ParsedCallback,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let amount_matches = parsed.amount == attempt.amount;

        if let Some(stored) = attempt.attempt_status().filter(|s| s.is_terminal()) {
            let outcome = terminal_outcome(stored, parsed.success, amount_matches);
            match &outcome {
                ReconcileOutcome::Duplicate { .. } => {
                    info!(provider, order_id, status = %stored, "duplicate callback delivery, no-op");
                }
                _ => {
                    warn!(
                        provider,
                        order_id,
                        stored = %stored,
                        incoming_success = parsed.success,
                        "callback conflicts with terminal attempt state, keeping stored state"
                    );
                }
            }
            return Ok(outcome);
        }

        if !amount_matches {
            warn!(
                provider,
                order_id,
                expected = %attempt.amount,
                reported = %parsed.amount,
                "amount mismatch on verified callback, possible tampering"
            );
            return Ok(ReconcileOutcome::AmountMismatch {
                expected: attempt.amount,
                reported: parsed.amount,
            });
        }

        let status = if parsed.success {
            AttemptStatus::Successful
        } else {
            AttemptStatus::Failed
        };
        let completion = AttemptCompletion {
            status,
            transaction_id: parsed.provider_txn_id.clone(),
            response_code: parsed.result_code.clone(),
            response_message: parsed.result_message.clone(),
            paid_at: Utc::now(),
        };

        let won = self.store.complete_attempt(attempt.id, &completion).await?;
        if !won {
            // Lost the conditional update to a concurrent delivery. Re-read
            // and resolve against whatever terminal state won.
            let current = self.store.find_current_attempt(order_id).await?;
            let stored = current
                .as_ref()
                .and_then(|a| a.attempt_status())
                .unwrap_or(AttemptStatus::Expired);
            info!(provider, order_id, stored = %stored, "lost status race to concurrent delivery");
            return Ok(terminal_outcome(stored, parsed.success, amount_matches));
        }

        info!(provider, order_id, status = %status, "payment attempt reconciled");

        if status == AttemptStatus::Successful {
            self.finalize_success(order_id, &attempt, &parsed).await;
        }

        Ok(ReconcileOutcome::Applied(status))
    }

    /// Order update and confirmation email after a successful transition.
    /// The attempt is already terminal at this point; an order-update
    /// failure is escalated through retries and error logs, never by
    /// rolling the attempt back.
    async fn finalize_success(&self, order_id: i64, attempt: &PaymentAttempt, parsed: &ParsedCallback) {
        let paid_at = Utc::now();
        let mut updated = false;
        for try_number in 1..=ORDER_UPDATE_MAX_TRIES {
            match self.orders.mark_paid(order_id, paid_at).await {
                Ok(true) => {
                    updated = true;
                    break;
                }
                Ok(false) => {
                    // The order left the new state before we got here. An
                    // already-paid order is a benign replay; anything else
                    // (cancelled, failed) keeps its state and goes to manual
                    // review.
                    match self.orders.get_order(order_id).await {
                        Ok(order) if order.status == "paid" => {
                            info!(order_id, "order already paid, skipping update");
                        }
                        Ok(order) => {
                            warn!(
                                order_id,
                                order_status = %order.status,
                                "payment succeeded but order is no longer payable, needs manual review"
                            );
                        }
                        Err(err) => {
                            warn!(order_id, error = %err, "could not re-read order after guarded update lost");
                        }
                    }
                    break;
                }
                Err(err) if err.is_retryable() && try_number < ORDER_UPDATE_MAX_TRIES => {
                    warn!(order_id, try_number, error = %err, "order update failed, retrying");
                    tokio::time::sleep(ORDER_UPDATE_BASE_DELAY * try_number).await;
                }
                Err(err) => {
                    error!(
                        order_id,
                        error = %err,
                        "order update failed after payment success, needs manual reconciliation"
                    );
                    break;
                }
            }
        }

        if !updated {
            return;
        }

        let email = match self.orders.get_order(order_id).await {
            Ok(order) => order.customer_email,
            Err(err) => {
                warn!(order_id, error = %err, "could not load order for confirmation email");
                None
            }
        };

        let Some(to_email) = email else {
            info!(order_id, "no customer email on order, skipping confirmation");
            return;
        };

        let confirmation = PaymentConfirmation {
            to_email,
            order_id,
            amount: attempt.amount.clone(),
            payment_method: parsed.provider.to_string(),
        };
        if let Err(err) = self.notifier.send_payment_confirmation(&confirmation).await {
            warn!(order_id, error = %err, "payment confirmation email failed");
        }
    }
}

fn provider_label(parsed: &ParsedCallback) -> &'static str {
    parsed.provider.as_str()
}
