use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use tracing::{error, info};

use crate::api::ApiState;
use crate::gateways::gateway::Ack;
use crate::gateways::types::ProviderName;

/// POST /callbacks/momo
///
/// MoMo delivers its IPN as a JSON body.
pub async fn momo_callback(State(state): State<ApiState>, body: Bytes) -> Response {
    dispatch(&state, ProviderName::Momo, &body).await
}

/// GET /callbacks/vnpay/ipn
///
/// VNPay delivers its IPN as query parameters on a GET request.
pub async fn vnpay_ipn(State(state): State<ApiState>, RawQuery(query): RawQuery) -> Response {
    let raw = query.unwrap_or_default();
    dispatch(&state, ProviderName::Vnpay, raw.as_bytes()).await
}

/// POST /callbacks/vnpay
///
/// Form-encoded variant of the VNPay IPN, same parameter set as the GET.
pub async fn vnpay_callback(State(state): State<ApiState>, body: Bytes) -> Response {
    dispatch(&state, ProviderName::Vnpay, &body).await
}

/// POST /callbacks/zalopay
pub async fn zalopay_callback(State(state): State<ApiState>, body: Bytes) -> Response {
    dispatch(&state, ProviderName::Zalopay, &body).await
}

async fn dispatch(state: &ApiState, provider: ProviderName, raw: &[u8]) -> Response {
    info!(provider = provider.as_str(), bytes = raw.len(), "Received payment callback");

    let gateway = state.registry.get(provider);
    match state.engine.handle_callback(gateway, raw).await {
        Ok(outcome) => {
            info!(
                provider = provider.as_str(),
                outcome = outcome.label(),
                "Callback processed"
            );
            ack_to_response(gateway.ack(&outcome))
        }
        Err(e) => {
            // Store outage. A 5xx here is deliberate: the provider's retry
            // loop redelivers once storage is back, and redelivery is safe.
            error!(provider = provider.as_str(), error = %e, "Callback processing failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn ack_to_response(ack: Ack) -> Response {
    match ack.body {
        Some(body) => (ack.status, Json(body)).into_response(),
        None => ack.status.into_response(),
    }
}
