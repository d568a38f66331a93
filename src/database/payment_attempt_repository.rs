use crate::database::error::{DatabaseError, DatabaseErrorKind};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Lifecycle states of a payment attempt. Transitions are forward-only:
/// `Pending` may move to exactly one of the terminal states, and terminal
/// states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Successful,
    Failed,
    Expired,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Successful => "successful",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AttemptStatus::Pending),
            "successful" => Some(AttemptStatus::Successful),
            "failed" => Some(AttemptStatus::Failed),
            "expired" => Some(AttemptStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Pending)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment attempt entity. One row per payment URL/request generated for an
/// order; rows are never deleted. The amount is fixed at creation and the
/// status only moves forward.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub order_id: i64,
    pub provider: String,
    /// Provider-side reference captured at initiation time; used as the
    /// fallback mapping when a callback carries an opaque reference.
    pub provider_ref: Option<String>,
    pub amount: BigDecimal,
    pub status: String,
    pub transaction_id: Option<String>,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    pub fn attempt_status(&self) -> Option<AttemptStatus> {
        AttemptStatus::parse(&self.status)
    }
}

/// Terminal fields written when a verified callback settles an attempt.
#[derive(Debug, Clone)]
pub struct AttemptCompletion {
    pub status: AttemptStatus,
    pub transaction_id: Option<String>,
    pub response_code: String,
    pub response_message: Option<String>,
    pub paid_at: DateTime<Utc>,
}

const ATTEMPT_COLUMNS: &str = "id, order_id, provider, provider_ref, amount, status, \
     transaction_id, response_code, response_message, paid_at, created_at, updated_at";

/// Repository for payment attempts.
///
/// Status transitions go through conditional updates guarded on the current
/// status so concurrent callback deliveries serialize at the row level; the
/// forward-only invariant itself is the reconciliation engine's job.
pub struct PaymentAttemptRepository {
    pool: PgPool,
}

impl PaymentAttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new attempt for an order at payment-initiation time.
    ///
    /// Rejected when the order already has a successful attempt. Any older
    /// pending attempt for the order is expired inside the same transaction
    /// so at most one current attempt exists.
    pub async fn create_attempt(
        &self,
        order_id: i64,
        provider: &str,
        provider_ref: Option<&str>,
        amount: BigDecimal,
    ) -> Result<PaymentAttempt, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let already_paid: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM payment_attempts WHERE order_id = $1 AND status = 'successful')",
        )
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if already_paid {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Err(DatabaseError::new(DatabaseErrorKind::Duplicate {
                entity: "PaymentAttempt".to_string(),
                detail: format!("order {} already has a successful attempt", order_id),
            }));
        }

        sqlx::query(
            "UPDATE payment_attempts SET status = 'expired', updated_at = NOW() \
             WHERE order_id = $1 AND status = 'pending'",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let attempt = sqlx::query_as::<_, PaymentAttempt>(&format!(
            "INSERT INTO payment_attempts (order_id, provider, provider_ref, amount, status) \
             VALUES ($1, $2, $3, $4, 'pending') \
             RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(order_id)
        .bind(provider)
        .bind(provider_ref)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(attempt)
    }

    /// The order's current attempt (most recently created).
    pub async fn find_current_by_order_id(
        &self,
        order_id: i64,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        sqlx::query_as::<_, PaymentAttempt>(&format!(
            "SELECT {} FROM payment_attempts WHERE order_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
            ATTEMPT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Resolver fallback: map a provider's own reference back to the order
    /// it was issued for.
    pub async fn find_order_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> Result<Option<i64>, DatabaseError> {
        sqlx::query_scalar(
            "SELECT order_id FROM payment_attempts \
             WHERE provider = $1 AND provider_ref = $2 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(provider)
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Settle a pending attempt. Conditional on `status = 'pending'`; the
    /// return value reports whether this caller won the transition.
    pub async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        completion: &AttemptCompletion,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payment_attempts \
             SET status = $2, transaction_id = $3, response_code = $4, \
                 response_message = $5, paid_at = $6, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(attempt_id)
        .bind(completion.status.as_str())
        .bind(&completion.transaction_id)
        .bind(&completion.response_code)
        .bind(&completion.response_message)
        .bind(completion.paid_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// Expire a single pending attempt. No-op on terminal attempts.
    pub async fn expire_attempt(&self, attempt_id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payment_attempts SET status = 'expired', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(attempt_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// Pending attempts older than the cutoff, for the expiry sweep.
    pub async fn find_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, DatabaseError> {
        sqlx::query_as::<_, PaymentAttempt>(&format!(
            "SELECT {} FROM payment_attempts \
             WHERE status = 'pending' AND created_at < $1 \
             ORDER BY created_at ASC LIMIT $2",
            ATTEMPT_COLUMNS
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
