use crate::database::error::DatabaseError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A callback receipt: the full payload of one provider callback, recorded
/// before any reconciliation decision. The table is append-only and keeps
/// invalid and duplicate deliveries alongside the ones that were applied.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CallbackReceipt {
    pub id: Uuid,
    pub provider: String,
    pub order_id: Option<i64>,
    pub provider_ref: Option<String>,
    pub result_code: Option<String>,
    pub signature_valid: bool,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCallbackReceipt {
    pub provider: String,
    pub order_id: Option<i64>,
    pub provider_ref: Option<String>,
    pub result_code: Option<String>,
    pub signature_valid: bool,
    pub payload: serde_json::Value,
}

pub struct CallbackReceiptRepository {
    pool: PgPool,
}

impl CallbackReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, receipt: NewCallbackReceipt) -> Result<CallbackReceipt, DatabaseError> {
        sqlx::query_as::<_, CallbackReceipt>(
            "INSERT INTO callback_receipts \
                 (provider, order_id, provider_ref, result_code, signature_valid, payload) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, provider, order_id, provider_ref, result_code, \
                       signature_valid, payload, received_at",
        )
        .bind(&receipt.provider)
        .bind(receipt.order_id)
        .bind(&receipt.provider_ref)
        .bind(&receipt.result_code)
        .bind(receipt.signature_valid)
        .bind(&receipt.payload)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Receipts for one order, newest first. Used by the attempts API for
    /// support lookups.
    pub async fn find_by_order_id(
        &self,
        order_id: i64,
        limit: i64,
    ) -> Result<Vec<CallbackReceipt>, DatabaseError> {
        sqlx::query_as::<_, CallbackReceipt>(
            "SELECT id, provider, order_id, provider_ref, result_code, \
                    signature_valid, payload, received_at \
             FROM callback_receipts WHERE order_id = $1 \
             ORDER BY received_at DESC LIMIT $2",
        )
        .bind(order_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
