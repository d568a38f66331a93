pub mod attempts;
pub mod callbacks;
pub mod health;

use crate::database::store::PaymentRecordStore;
use crate::gateways::registry::GatewayRegistry;
use crate::health::HealthChecker;
use crate::services::orders::OrderService;
use crate::services::reconciliation::ReconciliationEngine;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ReconciliationEngine>,
    pub registry: Arc<GatewayRegistry>,
    pub store: Arc<dyn PaymentRecordStore>,
    pub orders: Arc<dyn OrderService>,
    pub health_checker: HealthChecker,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/callbacks/momo", post(callbacks::momo_callback))
        .route("/callbacks/vnpay/ipn", get(callbacks::vnpay_ipn))
        .route("/callbacks/vnpay", post(callbacks::vnpay_callback))
        .route("/callbacks/zalopay", post(callbacks::zalopay_callback))
        .route("/payments/attempts", post(attempts::create_attempt))
        .route(
            "/payments/attempts/{order_id}",
            get(attempts::get_attempt),
        )
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/health/live", get(health::liveness))
        .with_state(state)
}
