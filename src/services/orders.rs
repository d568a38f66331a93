use crate::database::error::DatabaseError;
use crate::database::order_repository::OrderRepository;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

/// The slice of an order the payment flow needs.
#[derive(Debug, Clone)]
pub struct OrderSummary {
    pub id: i64,
    pub total_amount: BigDecimal,
    pub status: String,
    pub customer_email: Option<String>,
}

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("order {0} not found")]
    NotFound(i64),

    #[error("order lookup failed: {0}")]
    Database(#[from] DatabaseError),
}

impl OrderServiceError {
    /// Transient errors are worth retrying; a missing order is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderServiceError::NotFound(_) => false,
            OrderServiceError::Database(err) => err.is_retryable(),
        }
    }
}

/// External collaborator owning order state. The engine only reads orders
/// and flips them to paid; everything else about orders lives in the shop
/// backend.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn get_order(&self, order_id: i64) -> Result<OrderSummary, OrderServiceError>;

    /// Transition the order from new to paid. Returns Ok(false) when the
    /// order is no longer new, whether already paid or since cancelled;
    /// the caller decides which of those is a conflict.
    async fn mark_paid(
        &self,
        order_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, OrderServiceError>;
}

pub struct PgOrderService {
    orders: OrderRepository,
}

impl PgOrderService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
        }
    }
}

#[async_trait]
impl OrderService for PgOrderService {
    async fn get_order(&self, order_id: i64) -> Result<OrderSummary, OrderServiceError> {
        let row = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderServiceError::NotFound(order_id))?;
        Ok(OrderSummary {
            id: row.id,
            total_amount: row.total_amount,
            status: row.status,
            customer_email: row.customer_email,
        })
    }

    async fn mark_paid(
        &self,
        order_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, OrderServiceError> {
        Ok(self.orders.mark_paid(order_id, paid_at).await?)
    }
}
