//! MoMo e-wallet IPN gateway.
//!
//! MoMo delivers a JSON notification and signs it with HMAC-SHA256 over an
//! `accessKey=..&amount=..` concatenation in fixed alphabetical field order.
//! A single field reorder invalidates every signature, so the canonical
//! string is built in one place and covered by tests.

use crate::gateways::error::{GatewayError, GatewayResult};
use crate::gateways::gateway::{Ack, CallbackGateway};
use crate::gateways::signing::verify_hmac_sha256_hex;
use crate::gateways::types::{ParsedCallback, ProviderName, VerificationResult};
use crate::services::reconciliation::ReconcileOutcome;
use bigdecimal::BigDecimal;
use http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct MomoConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
}

impl MomoConfig {
    pub fn from_env() -> GatewayResult<Self> {
        let require = |name: &str| {
            std::env::var(name).map_err(|_| GatewayError::Configuration {
                message: format!("{} environment variable is required", name),
            })
        };
        Ok(Self {
            partner_code: require("MOMO_PARTNER_CODE")?,
            access_key: require("MOMO_ACCESS_KEY")?,
            secret_key: require("MOMO_SECRET_KEY")?,
        })
    }
}

pub struct MomoGateway {
    config: MomoConfig,
}

impl MomoGateway {
    pub fn new(config: MomoConfig) -> Self {
        Self { config }
    }

    fn canonical_string(&self, cb: &MomoCallback) -> String {
        // Field order is fixed by the MoMo IPN contract.
        format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
            self.config.access_key,
            cb.amount,
            cb.extra_data,
            cb.message,
            cb.order_id,
            cb.order_info,
            cb.order_type,
            cb.partner_code,
            cb.pay_type,
            cb.request_id,
            cb.response_time,
            cb.result_code,
            cb.trans_id,
        )
    }
}

impl CallbackGateway for MomoGateway {
    fn name(&self) -> ProviderName {
        ProviderName::Momo
    }

    fn verify(&self, raw: &[u8]) -> VerificationResult {
        let cb: MomoCallback = match serde_json::from_slice(raw) {
            Ok(cb) => cb,
            Err(e) => return VerificationResult::invalid(format!("invalid momo JSON: {}", e)),
        };
        if cb.partner_code != self.config.partner_code {
            return VerificationResult::invalid("partner code mismatch");
        }
        let canonical = self.canonical_string(&cb);
        if verify_hmac_sha256_hex(canonical.as_bytes(), &self.config.secret_key, &cb.signature) {
            VerificationResult::valid()
        } else {
            VerificationResult::invalid("momo signature mismatch")
        }
    }

    fn parse(&self, raw: &[u8]) -> GatewayResult<ParsedCallback> {
        let cb: MomoCallback = serde_json::from_slice(raw)
            .map_err(|e| GatewayError::malformed(format!("invalid momo JSON: {}", e)))?;
        Ok(ParsedCallback {
            provider: ProviderName::Momo,
            order_ref: cb.order_id,
            provider_txn_id: (cb.trans_id != 0).then(|| cb.trans_id.to_string()),
            amount: BigDecimal::from(cb.amount),
            success: cb.result_code == 0,
            result_code: cb.result_code.to_string(),
            result_message: (!cb.message.is_empty()).then_some(cb.message),
        })
    }

    // MoMo stops retrying on any 2xx; the body is ignored. Rejections are
    // also acknowledged with 204 so a bad delivery cannot trigger a retry
    // storm.
    fn ack(&self, _outcome: &ReconcileOutcome) -> Ack {
        Ack::empty(StatusCode::NO_CONTENT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MomoCallback {
    partner_code: String,
    order_id: String,
    request_id: String,
    amount: u64,
    order_info: String,
    order_type: String,
    trans_id: i64,
    result_code: i64,
    message: String,
    pay_type: String,
    response_time: i64,
    #[serde(default)]
    extra_data: String,
    signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::signing::hmac_sha256_hex;
    use serde_json::json;

    fn gateway() -> MomoGateway {
        MomoGateway::new(MomoConfig {
            partner_code: "GLOWCART".to_string(),
            access_key: "access_test".to_string(),
            secret_key: "secret_test".to_string(),
        })
    }

    fn signed_payload(gateway: &MomoGateway, order_id: &str, amount: u64, result_code: i64) -> Vec<u8> {
        let canonical = format!(
            "accessKey={}&amount={}&extraData=&message=Success&orderId={}&orderInfo=order&orderType=momo_wallet&partnerCode=GLOWCART&payType=qr&requestId=req_1&responseTime=1700000000000&resultCode={}&transId=99001122",
            gateway.config.access_key, amount, order_id, result_code,
        );
        let signature = hmac_sha256_hex(canonical.as_bytes(), &gateway.config.secret_key).unwrap();
        serde_json::to_vec(&json!({
            "partnerCode": "GLOWCART",
            "orderId": order_id,
            "requestId": "req_1",
            "amount": amount,
            "orderInfo": "order",
            "orderType": "momo_wallet",
            "transId": 99001122_i64,
            "resultCode": result_code,
            "message": "Success",
            "payType": "qr",
            "responseTime": 1700000000000_i64,
            "extraData": "",
            "signature": signature,
        }))
        .unwrap()
    }

    #[test]
    fn valid_signature_verifies() {
        let gw = gateway();
        let raw = signed_payload(&gw, "ORDER_123", 250000, 0);
        assert!(gw.verify(&raw).valid);
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let gw = gateway();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&signed_payload(&gw, "ORDER_123", 250000, 0)).unwrap();
        payload["amount"] = json!(999999);
        let raw = serde_json::to_vec(&payload).unwrap();
        assert!(!gw.verify(&raw).valid);
    }

    #[test]
    fn wrong_partner_code_fails_closed() {
        let gw = gateway();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&signed_payload(&gw, "ORDER_123", 250000, 0)).unwrap();
        payload["partnerCode"] = json!("OTHER");
        let raw = serde_json::to_vec(&payload).unwrap();
        assert!(!gw.verify(&raw).valid);
    }

    #[test]
    fn missing_field_fails_closed() {
        let gw = gateway();
        let raw = br#"{"partnerCode":"GLOWCART","orderId":"ORDER_123"}"#;
        assert!(!gw.verify(raw).valid);
    }

    #[test]
    fn parse_maps_success_callback() {
        let gw = gateway();
        let raw = signed_payload(&gw, "ORDER_123", 250000, 0);
        let parsed = gw.parse(&raw).unwrap();
        assert_eq!(parsed.order_ref, "ORDER_123");
        assert_eq!(parsed.amount, BigDecimal::from(250000_u64));
        assert!(parsed.success);
        assert_eq!(parsed.provider_txn_id.as_deref(), Some("99001122"));
    }

    #[test]
    fn parse_maps_failure_result_code() {
        let gw = gateway();
        let raw = signed_payload(&gw, "ORDER_123", 250000, 1006);
        let parsed = gw.parse(&raw).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.result_code, "1006");
    }

    #[test]
    fn ack_is_always_no_content() {
        let gw = gateway();
        let ack = gw.ack(&ReconcileOutcome::InvalidSignature);
        assert_eq!(ack.status, StatusCode::NO_CONTENT);
        assert!(ack.body.is_none());
    }
}
