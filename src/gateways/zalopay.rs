//! ZaloPay callback gateway.
//!
//! ZaloPay wraps the notification in a `{ data, mac, type }` envelope where
//! `data` is a JSON string and `mac` is HMAC-SHA256 of that exact string
//! with the merchant's `key2`. The order reference travels in
//! `app_trans_id`, which ZaloPay requires to start with a `yymmdd_` date
//! token; the gateway strips that framing before handing the reference on.

use crate::gateways::error::{GatewayError, GatewayResult};
use crate::gateways::gateway::{Ack, CallbackGateway};
use crate::gateways::signing::verify_hmac_sha256_hex;
use crate::gateways::types::{ParsedCallback, ProviderName, VerificationResult};
use crate::services::reconciliation::ReconcileOutcome;
use bigdecimal::BigDecimal;
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;

/// Envelope `type` for a successful payment notification.
const CALLBACK_TYPE_PAYMENT: i32 = 1;

#[derive(Debug, Clone)]
pub struct ZalopayConfig {
    pub app_id: String,
    pub key2: String,
}

impl ZalopayConfig {
    pub fn from_env() -> GatewayResult<Self> {
        let require = |name: &str| {
            std::env::var(name).map_err(|_| GatewayError::Configuration {
                message: format!("{} environment variable is required", name),
            })
        };
        Ok(Self {
            app_id: require("ZALOPAY_APP_ID")?,
            key2: require("ZALOPAY_KEY2")?,
        })
    }
}

pub struct ZalopayGateway {
    config: ZalopayConfig,
}

impl ZalopayGateway {
    pub fn new(config: ZalopayConfig) -> Self {
        Self { config }
    }

    fn decode_envelope(raw: &[u8]) -> GatewayResult<ZalopayEnvelope> {
        serde_json::from_slice(raw)
            .map_err(|e| GatewayError::malformed(format!("invalid zalopay envelope: {}", e)))
    }

    /// Drops the mandatory `yymmdd_` date token from `app_trans_id`.
    fn strip_date_prefix(app_trans_id: &str) -> &str {
        match app_trans_id.split_once('_') {
            Some((date, rest)) if date.len() == 6 && date.chars().all(|c| c.is_ascii_digit()) => {
                rest
            }
            _ => app_trans_id,
        }
    }
}

impl CallbackGateway for ZalopayGateway {
    fn name(&self) -> ProviderName {
        ProviderName::Zalopay
    }

    fn verify(&self, raw: &[u8]) -> VerificationResult {
        let envelope = match Self::decode_envelope(raw) {
            Ok(env) => env,
            Err(e) => return VerificationResult::invalid(e.to_string()),
        };
        // The MAC covers the untouched data string, not re-serialized JSON.
        if verify_hmac_sha256_hex(envelope.data.as_bytes(), &self.config.key2, &envelope.mac) {
            VerificationResult::valid()
        } else {
            VerificationResult::invalid("zalopay mac mismatch")
        }
    }

    fn parse(&self, raw: &[u8]) -> GatewayResult<ParsedCallback> {
        let envelope = Self::decode_envelope(raw)?;
        let data: ZalopayData = serde_json::from_str(&envelope.data)
            .map_err(|e| GatewayError::malformed(format!("invalid zalopay data: {}", e)))?;
        if data.app_id.to_string() != self.config.app_id {
            return Err(GatewayError::malformed(format!(
                "unexpected zalopay app_id: {}",
                data.app_id
            )));
        }
        Ok(ParsedCallback {
            provider: ProviderName::Zalopay,
            order_ref: Self::strip_date_prefix(&data.app_trans_id).to_string(),
            provider_txn_id: (data.zp_trans_id != 0).then(|| data.zp_trans_id.to_string()),
            amount: BigDecimal::from(data.amount),
            // ZaloPay only notifies on completed payments; the envelope type
            // distinguishes payment callbacks from agreement callbacks.
            success: envelope.callback_type == CALLBACK_TYPE_PAYMENT,
            result_code: envelope.callback_type.to_string(),
            result_message: None,
        })
    }

    // return_code 1 tells ZaloPay the callback is consumed, 2 flags a bad
    // MAC, anything else triggers a redelivery. Only a store outage should
    // ever cause a retry, so every reconciliation outcome maps to 1 or 2.
    fn ack(&self, outcome: &ReconcileOutcome) -> Ack {
        let (code, message) = match outcome {
            ReconcileOutcome::InvalidSignature => (2, "mac not matched"),
            ReconcileOutcome::Applied(_) => (1, "success"),
            ReconcileOutcome::Duplicate { .. } => (1, "already processed"),
            ReconcileOutcome::Conflict { .. } => (1, "order already finalized"),
            ReconcileOutcome::Orphaned { .. } | ReconcileOutcome::UnresolvedReference => {
                (1, "order not recognized")
            }
            ReconcileOutcome::AmountMismatch { .. } => (1, "amount rejected"),
        };
        Ack::json(
            StatusCode::OK,
            json!({ "return_code": code, "return_message": message }),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ZalopayEnvelope {
    data: String,
    mac: String,
    #[serde(rename = "type")]
    callback_type: i32,
}

#[derive(Debug, Deserialize)]
struct ZalopayData {
    app_id: i64,
    app_trans_id: String,
    amount: i64,
    #[serde(default)]
    zp_trans_id: i64,
}
