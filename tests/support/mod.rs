//! In-memory doubles for the persistence and collaborator seams.
//!
//! Shared by every integration test file; not every helper is used from
//! every file.
#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use glowcart_payments::database::callback_receipt_repository::{CallbackReceipt, NewCallbackReceipt};
use glowcart_payments::database::error::{DatabaseError, DatabaseErrorKind};
use glowcart_payments::database::payment_attempt_repository::{
    AttemptCompletion, AttemptStatus, PaymentAttempt,
};
use glowcart_payments::database::store::PaymentRecordStore;
use glowcart_payments::services::notification::{
    NotificationDispatcher, NotificationError, PaymentConfirmation,
};
use glowcart_payments::services::orders::{OrderService, OrderServiceError, OrderSummary};

#[derive(Default)]
pub struct MemoryStore {
    attempts: Mutex<Vec<PaymentAttempt>>,
    receipts: Mutex<Vec<CallbackReceipt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receipts(&self) -> Vec<CallbackReceipt> {
        self.receipts.lock().unwrap().clone()
    }

    /// Backdate an attempt so the expiry sweep sees it as stale.
    pub fn backdate(&self, attempt_id: Uuid, created_at: DateTime<Utc>) {
        let mut attempts = self.attempts.lock().unwrap();
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == attempt_id) {
            attempt.created_at = created_at;
        }
    }
}

#[async_trait]
impl PaymentRecordStore for MemoryStore {
    async fn create_attempt(
        &self,
        order_id: i64,
        provider: &str,
        provider_ref: Option<&str>,
        amount: BigDecimal,
    ) -> Result<PaymentAttempt, DatabaseError> {
        let mut attempts = self.attempts.lock().unwrap();
        if attempts
            .iter()
            .any(|a| a.order_id == order_id && a.status == "successful")
        {
            return Err(DatabaseError::new(DatabaseErrorKind::Duplicate {
                entity: "PaymentAttempt".to_string(),
                detail: format!("order {} already has a successful attempt", order_id),
            }));
        }
        for attempt in attempts
            .iter_mut()
            .filter(|a| a.order_id == order_id && a.status == "pending")
        {
            attempt.status = "expired".to_string();
        }
        let now = Utc::now();
        let attempt = PaymentAttempt {
            id: Uuid::new_v4(),
            order_id,
            provider: provider.to_string(),
            provider_ref: provider_ref.map(|s| s.to_string()),
            amount,
            status: "pending".to_string(),
            transaction_id: None,
            response_code: None,
            response_message: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn find_current_attempt(
        &self,
        order_id: i64,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .iter()
            .filter(|a| a.order_id == order_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn find_order_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> Result<Option<i64>, DatabaseError> {
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .iter()
            .filter(|a| a.provider == provider && a.provider_ref.as_deref() == Some(provider_ref))
            .max_by_key(|a| a.created_at)
            .map(|a| a.order_id))
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        completion: &AttemptCompletion,
    ) -> Result<bool, DatabaseError> {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts
            .iter_mut()
            .find(|a| a.id == attempt_id && a.status == "pending")
        {
            Some(attempt) => {
                attempt.status = completion.status.as_str().to_string();
                attempt.transaction_id = completion.transaction_id.clone();
                attempt.response_code = Some(completion.response_code.clone());
                attempt.response_message = completion.response_message.clone();
                attempt.paid_at = Some(completion.paid_at);
                attempt.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn expire_attempt(&self, attempt_id: Uuid) -> Result<bool, DatabaseError> {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts
            .iter_mut()
            .find(|a| a.id == attempt_id && a.status == "pending")
        {
            Some(attempt) => {
                attempt.status = "expired".to_string();
                attempt.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, DatabaseError> {
        let attempts = self.attempts.lock().unwrap();
        let mut stale: Vec<PaymentAttempt> = attempts
            .iter()
            .filter(|a| a.status == "pending" && a.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|a| a.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn append_receipt(
        &self,
        receipt: NewCallbackReceipt,
    ) -> Result<CallbackReceipt, DatabaseError> {
        let stored = CallbackReceipt {
            id: Uuid::new_v4(),
            provider: receipt.provider,
            order_id: receipt.order_id,
            provider_ref: receipt.provider_ref,
            result_code: receipt.result_code,
            signature_valid: receipt.signature_valid,
            payload: receipt.payload,
            received_at: Utc::now(),
        };
        self.receipts.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn receipts_for_order(
        &self,
        order_id: i64,
        limit: i64,
    ) -> Result<Vec<CallbackReceipt>, DatabaseError> {
        let receipts = self.receipts.lock().unwrap();
        let mut matched: Vec<CallbackReceipt> = receipts
            .iter()
            .filter(|r| r.order_id == Some(order_id))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        matched.truncate(limit as usize);
        Ok(matched)
    }
}

/// Order collaborator spy recording every status transition call.
#[derive(Default)]
pub struct SpyOrderService {
    orders: Mutex<HashMap<i64, OrderSummary>>,
    mark_paid_calls: Mutex<Vec<i64>>,
}

impl SpyOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(self, id: i64, amount: BigDecimal, email: Option<&str>) -> Self {
        self.orders.lock().unwrap().insert(
            id,
            OrderSummary {
                id,
                total_amount: amount,
                status: "new".to_string(),
                customer_email: email.map(|s| s.to_string()),
            },
        );
        self
    }

    pub fn mark_paid_calls(&self) -> Vec<i64> {
        self.mark_paid_calls.lock().unwrap().clone()
    }

    /// Force an order into a status directly, e.g. a cancellation that
    /// happened outside the payment flow.
    pub fn set_order_status(&self, id: i64, status: &str) {
        if let Some(order) = self.orders.lock().unwrap().get_mut(&id) {
            order.status = status.to_string();
        }
    }

    pub fn order_status(&self, id: i64) -> Option<String> {
        self.orders.lock().unwrap().get(&id).map(|o| o.status.clone())
    }
}

#[async_trait]
impl OrderService for SpyOrderService {
    async fn get_order(&self, order_id: i64) -> Result<OrderSummary, OrderServiceError> {
        self.orders
            .lock()
            .unwrap()
            .get(&order_id)
            .cloned()
            .ok_or(OrderServiceError::NotFound(order_id))
    }

    async fn mark_paid(
        &self,
        order_id: i64,
        _paid_at: DateTime<Utc>,
    ) -> Result<bool, OrderServiceError> {
        self.mark_paid_calls.lock().unwrap().push(order_id);
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&order_id) {
            Some(order) if order.status == "new" => {
                order.status = "paid".to_string();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(OrderServiceError::NotFound(order_id)),
        }
    }
}

/// Notification spy capturing confirmations instead of sending them.
#[derive(Default)]
pub struct SpyNotifier {
    sent: Mutex<Vec<PaymentConfirmation>>,
}

impl SpyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<PaymentConfirmation> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for SpyNotifier {
    async fn send_payment_confirmation(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(confirmation.clone());
        Ok(())
    }
}

/// Store where every conditional completion loses to a concurrent delivery
/// that settled the attempt with `winner` in the meantime.
pub struct RacingStore {
    inner: MemoryStore,
    winner: AttemptStatus,
}

impl RacingStore {
    pub fn new(winner: AttemptStatus) -> Self {
        Self {
            inner: MemoryStore::new(),
            winner,
        }
    }
}

#[async_trait]
impl PaymentRecordStore for RacingStore {
    async fn create_attempt(
        &self,
        order_id: i64,
        provider: &str,
        provider_ref: Option<&str>,
        amount: BigDecimal,
    ) -> Result<PaymentAttempt, DatabaseError> {
        self.inner
            .create_attempt(order_id, provider, provider_ref, amount)
            .await
    }

    async fn find_current_attempt(
        &self,
        order_id: i64,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        self.inner.find_current_attempt(order_id).await
    }

    async fn find_order_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> Result<Option<i64>, DatabaseError> {
        self.inner
            .find_order_by_provider_ref(provider, provider_ref)
            .await
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        _completion: &AttemptCompletion,
    ) -> Result<bool, DatabaseError> {
        let mut attempts = self.inner.attempts.lock().unwrap();
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == attempt_id) {
            attempt.status = self.winner.as_str().to_string();
        }
        Ok(false)
    }

    async fn expire_attempt(&self, attempt_id: Uuid) -> Result<bool, DatabaseError> {
        self.inner.expire_attempt(attempt_id).await
    }

    async fn find_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, DatabaseError> {
        self.inner.find_expired_pending(cutoff, limit).await
    }

    async fn append_receipt(
        &self,
        receipt: NewCallbackReceipt,
    ) -> Result<CallbackReceipt, DatabaseError> {
        self.inner.append_receipt(receipt).await
    }

    async fn receipts_for_order(
        &self,
        order_id: i64,
        limit: i64,
    ) -> Result<Vec<CallbackReceipt>, DatabaseError> {
        self.inner.receipts_for_order(order_id, limit).await
    }
}

/// Store where only the provider-ref fallback lookup fails, simulating a
/// transient database outage on that one query.
#[derive(Default)]
pub struct RefLookupOutageStore {
    inner: MemoryStore,
}

impl RefLookupOutageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receipts(&self) -> Vec<CallbackReceipt> {
        self.inner.receipts()
    }
}

#[async_trait]
impl PaymentRecordStore for RefLookupOutageStore {
    async fn create_attempt(
        &self,
        order_id: i64,
        provider: &str,
        provider_ref: Option<&str>,
        amount: BigDecimal,
    ) -> Result<PaymentAttempt, DatabaseError> {
        self.inner
            .create_attempt(order_id, provider, provider_ref, amount)
            .await
    }

    async fn find_current_attempt(
        &self,
        order_id: i64,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        self.inner.find_current_attempt(order_id).await
    }

    async fn find_order_by_provider_ref(
        &self,
        _provider: &str,
        _provider_ref: &str,
    ) -> Result<Option<i64>, DatabaseError> {
        Err(DatabaseError::new(DatabaseErrorKind::Connection {
            message: "connection refused".to_string(),
        }))
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        completion: &AttemptCompletion,
    ) -> Result<bool, DatabaseError> {
        self.inner.complete_attempt(attempt_id, completion).await
    }

    async fn expire_attempt(&self, attempt_id: Uuid) -> Result<bool, DatabaseError> {
        self.inner.expire_attempt(attempt_id).await
    }

    async fn find_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, DatabaseError> {
        self.inner.find_expired_pending(cutoff, limit).await
    }

    async fn append_receipt(
        &self,
        receipt: NewCallbackReceipt,
    ) -> Result<CallbackReceipt, DatabaseError> {
        self.inner.append_receipt(receipt).await
    }

    async fn receipts_for_order(
        &self,
        order_id: i64,
        limit: i64,
    ) -> Result<Vec<CallbackReceipt>, DatabaseError> {
        self.inner.receipts_for_order(order_id, limit).await
    }
}
