use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{error, info};

use crate::api::ApiState;
use crate::database::callback_receipt_repository::CallbackReceipt;
use crate::database::error::DatabaseErrorKind;
use crate::database::payment_attempt_repository::PaymentAttempt;
use crate::gateways::types::ProviderName;
use crate::middleware::error::{get_request_id_from_headers, json_error_response};
use crate::services::orders::OrderServiceError;

const RECEIPT_HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct CreateAttemptRequest {
    pub order_id: i64,
    pub provider: String,
    /// Reference issued by the provider at initiation time, when known.
    /// Stored so opaque callback references can be mapped back later.
    pub provider_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttemptDetails {
    pub attempt: PaymentAttempt,
    pub receipts: Vec<CallbackReceipt>,
}

/// POST /payments/attempts
///
/// Registers a payment attempt at initiation time. The amount is taken from
/// the order, never from the request, so a tampered client cannot seed a
/// wrong expected amount.
pub async fn create_attempt(
    State(state): State<ApiState>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<CreateAttemptRequest>,
) -> impl IntoResponse {
    let request_id = get_request_id_from_headers(&headers);

    let provider = match ProviderName::from_str(&payload.provider) {
        Ok(p) => p,
        Err(e) => {
            return json_error_response(StatusCode::BAD_REQUEST, e.to_string(), request_id)
                .into_response();
        }
    };

    let order = match state.orders.get_order(payload.order_id).await {
        Ok(order) => order,
        Err(OrderServiceError::NotFound(id)) => {
            return json_error_response(
                StatusCode::NOT_FOUND,
                format!("order {} not found", id),
                request_id,
            )
            .into_response();
        }
        Err(e) => {
            error!(order_id = payload.order_id, error = %e, "Order lookup failed");
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                request_id,
            )
            .into_response();
        }
    };

    match state
        .store
        .create_attempt(
            order.id,
            provider.as_str(),
            payload.provider_ref.as_deref(),
            order.total_amount,
        )
        .await
    {
        Ok(attempt) => {
            info!(
                order_id = order.id,
                provider = provider.as_str(),
                attempt_id = %attempt.id,
                "Payment attempt created"
            );
            (StatusCode::CREATED, Json(attempt)).into_response()
        }
        Err(e) if matches!(e.kind, DatabaseErrorKind::Duplicate { .. }) => {
            json_error_response(StatusCode::CONFLICT, e.to_string(), request_id).into_response()
        }
        Err(e) => {
            error!(order_id = order.id, error = %e, "Failed to create payment attempt");
            json_error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), request_id)
                .into_response()
        }
    }
}

/// GET /payments/attempts/{order_id}
///
/// Current attempt for an order plus its recent callback receipts, for
/// support and manual reconciliation.
pub async fn get_attempt(
    State(state): State<ApiState>,
    Path(order_id): Path<i64>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    let request_id = get_request_id_from_headers(&headers);

    let attempt = match state.store.find_current_attempt(order_id).await {
        Ok(Some(attempt)) => attempt,
        Ok(None) => {
            return json_error_response(
                StatusCode::NOT_FOUND,
                format!("no payment attempt for order {}", order_id),
                request_id,
            )
            .into_response();
        }
        Err(e) => {
            error!(order_id, error = %e, "Attempt lookup failed");
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                request_id,
            )
            .into_response();
        }
    };

    let receipts = match state
        .store
        .receipts_for_order(order_id, RECEIPT_HISTORY_LIMIT)
        .await
    {
        Ok(receipts) => receipts,
        Err(e) => {
            error!(order_id, error = %e, "Receipt lookup failed");
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                request_id,
            )
            .into_response();
        }
    };

    Json(AttemptDetails { attempt, receipts }).into_response()
}
