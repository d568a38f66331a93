use crate::database::error::DatabaseError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Order row as the payments service sees it. Orders are owned by the shop
/// backend; this repository only reads them and flips the payment status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderRow {
    pub id: i64,
    pub total_amount: BigDecimal,
    pub status: String,
    pub customer_email: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, order_id: i64) -> Result<Option<OrderRow>, DatabaseError> {
        sqlx::query_as::<_, OrderRow>(
            "SELECT id, total_amount, status, customer_email, paid_at, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Mark an order paid. Conditional on the order still being new, so
    /// replayed callbacks never rewrite `paid_at` and a cancelled or failed
    /// order is never flipped back to paid.
    pub async fn mark_paid(
        &self,
        order_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'paid', paid_at = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'new'",
        )
        .bind(order_id)
        .bind(paid_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}
