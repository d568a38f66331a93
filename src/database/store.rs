use crate::database::callback_receipt_repository::{
    CallbackReceipt, CallbackReceiptRepository, NewCallbackReceipt,
};
use crate::database::error::DatabaseError;
use crate::database::payment_attempt_repository::{
    AttemptCompletion, PaymentAttempt, PaymentAttemptRepository,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Persistence seam for payment attempts and callback receipts. The
/// reconciliation engine and the expiry sweep only talk to this trait, which
/// keeps them testable against an in-memory double.
#[async_trait]
pub trait PaymentRecordStore: Send + Sync {
    async fn create_attempt(
        &self,
        order_id: i64,
        provider: &str,
        provider_ref: Option<&str>,
        amount: BigDecimal,
    ) -> Result<PaymentAttempt, DatabaseError>;

    async fn find_current_attempt(
        &self,
        order_id: i64,
    ) -> Result<Option<PaymentAttempt>, DatabaseError>;

    async fn find_order_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> Result<Option<i64>, DatabaseError>;

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        completion: &AttemptCompletion,
    ) -> Result<bool, DatabaseError>;

    async fn expire_attempt(&self, attempt_id: Uuid) -> Result<bool, DatabaseError>;

    async fn find_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, DatabaseError>;

    async fn append_receipt(
        &self,
        receipt: NewCallbackReceipt,
    ) -> Result<CallbackReceipt, DatabaseError>;

    async fn receipts_for_order(
        &self,
        order_id: i64,
        limit: i64,
    ) -> Result<Vec<CallbackReceipt>, DatabaseError>;
}

/// Postgres-backed store composing the row repositories.
pub struct PgPaymentRecordStore {
    attempts: PaymentAttemptRepository,
    receipts: CallbackReceiptRepository,
}

impl PgPaymentRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            attempts: PaymentAttemptRepository::new(pool.clone()),
            receipts: CallbackReceiptRepository::new(pool),
        }
    }
}

#[async_trait]
impl PaymentRecordStore for PgPaymentRecordStore {
    async fn create_attempt(
        &self,
        order_id: i64,
        provider: &str,
        provider_ref: Option<&str>,
        amount: BigDecimal,
    ) -> Result<PaymentAttempt, DatabaseError> {
        self.attempts
            .create_attempt(order_id, provider, provider_ref, amount)
            .await
    }

    async fn find_current_attempt(
        &self,
        order_id: i64,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        self.attempts.find_current_by_order_id(order_id).await
    }

    async fn find_order_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> Result<Option<i64>, DatabaseError> {
        self.attempts
            .find_order_by_provider_ref(provider, provider_ref)
            .await
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        completion: &AttemptCompletion,
    ) -> Result<bool, DatabaseError> {
        self.attempts.complete_attempt(attempt_id, completion).await
    }

    async fn expire_attempt(&self, attempt_id: Uuid) -> Result<bool, DatabaseError> {
        self.attempts.expire_attempt(attempt_id).await
    }

    async fn find_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, DatabaseError> {
        self.attempts.find_expired_pending(cutoff, limit).await
    }

    async fn append_receipt(
        &self,
        receipt: NewCallbackReceipt,
    ) -> Result<CallbackReceipt, DatabaseError> {
        self.receipts.append(receipt).await
    }

    async fn receipts_for_order(
        &self,
        order_id: i64,
        limit: i64,
    ) -> Result<Vec<CallbackReceipt>, DatabaseError> {
        self.receipts.find_by_order_id(order_id, limit).await
    }
}
