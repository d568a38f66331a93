//! VNPay IPN gateway.
//!
//! VNPay delivers the notification as URL-encoded query parameters. The MAC
//! is HMAC-SHA512 over the remaining `vnp_*` parameters sorted by key and
//! re-encoded, with `vnp_SecureHash`/`vnp_SecureHashType` excluded. Amounts
//! on the wire are VND multiplied by 100.

use crate::gateways::error::{GatewayError, GatewayResult};
use crate::gateways::gateway::{Ack, CallbackGateway};
use crate::gateways::signing::verify_hmac_sha512_hex;
use crate::gateways::types::{ParsedCallback, ProviderName, VerificationResult};
use crate::services::reconciliation::ReconcileOutcome;
use bigdecimal::BigDecimal;
use http::StatusCode;
use serde_json::json;

const SUCCESS_RESPONSE_CODE: &str = "00";

#[derive(Debug, Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
}

impl VnpayConfig {
    pub fn from_env() -> GatewayResult<Self> {
        let require = |name: &str| {
            std::env::var(name).map_err(|_| GatewayError::Configuration {
                message: format!("{} environment variable is required", name),
            })
        };
        Ok(Self {
            tmn_code: require("VNPAY_TMN_CODE")?,
            hash_secret: require("VNPAY_HASH_SECRET")?,
        })
    }
}

pub struct VnpayGateway {
    config: VnpayConfig,
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    fn decode_params(raw: &[u8]) -> GatewayResult<Vec<(String, String)>> {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw)
            .map_err(|e| GatewayError::malformed(format!("invalid vnpay query string: {}", e)))
    }

    /// Sorted, re-encoded parameter string the MAC is computed over.
    fn canonical_string(params: &[(String, String)]) -> String {
        let mut signable: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| k != "vnp_SecureHash" && k != "vnp_SecureHashType")
            .cloned()
            .collect();
        signable.sort_by(|a, b| a.0.cmp(&b.0));
        serde_urlencoded::to_string(&signable).unwrap_or_default()
    }

    fn field<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl CallbackGateway for VnpayGateway {
    fn name(&self) -> ProviderName {
        ProviderName::Vnpay
    }

    fn verify(&self, raw: &[u8]) -> VerificationResult {
        let params = match Self::decode_params(raw) {
            Ok(p) => p,
            Err(e) => return VerificationResult::invalid(e.to_string()),
        };
        let provided = match Self::field(&params, "vnp_SecureHash") {
            Some(h) => h,
            None => return VerificationResult::invalid("missing vnp_SecureHash"),
        };
        match Self::field(&params, "vnp_TmnCode") {
            Some(code) if code == self.config.tmn_code => {}
            _ => return VerificationResult::invalid("terminal code mismatch"),
        }
        let canonical = Self::canonical_string(&params);
        if verify_hmac_sha512_hex(canonical.as_bytes(), &self.config.hash_secret, provided) {
            VerificationResult::valid()
        } else {
            VerificationResult::invalid("vnpay secure hash mismatch")
        }
    }

    fn parse(&self, raw: &[u8]) -> GatewayResult<ParsedCallback> {
        let params = Self::decode_params(raw)?;
        let txn_ref = Self::field(&params, "vnp_TxnRef")
            .ok_or_else(|| GatewayError::missing("vnp_TxnRef"))?;
        let raw_amount = Self::field(&params, "vnp_Amount")
            .ok_or_else(|| GatewayError::missing("vnp_Amount"))?;
        let response_code = Self::field(&params, "vnp_ResponseCode")
            .ok_or_else(|| GatewayError::missing("vnp_ResponseCode"))?;

        // Wire amounts carry two implied decimal places.
        let scaled: i64 = raw_amount
            .parse()
            .map_err(|_| GatewayError::malformed(format!("invalid vnp_Amount: {}", raw_amount)))?;
        let amount = BigDecimal::from(scaled) / BigDecimal::from(100);

        Ok(ParsedCallback {
            provider: ProviderName::Vnpay,
            order_ref: txn_ref.to_string(),
            provider_txn_id: Self::field(&params, "vnp_TransactionNo").map(|v| v.to_string()),
            amount,
            success: response_code == SUCCESS_RESPONSE_CODE,
            result_code: response_code.to_string(),
            result_message: Self::field(&params, "vnp_OrderInfo").map(|v| v.to_string()),
        })
    }

    // VNPay retries until it sees HTTP 200 with its RspCode envelope; every
    // disposition is therefore a 200, with the code distinguishing them.
    fn ack(&self, outcome: &ReconcileOutcome) -> Ack {
        let (code, message) = match outcome {
            ReconcileOutcome::Applied(_) => ("00", "Confirm Success"),
            ReconcileOutcome::Duplicate { .. } | ReconcileOutcome::Conflict { .. } => {
                ("02", "Order already confirmed")
            }
            ReconcileOutcome::Orphaned { .. } | ReconcileOutcome::UnresolvedReference => {
                ("01", "Order not found")
            }
            ReconcileOutcome::AmountMismatch { .. } => ("04", "Invalid amount"),
            ReconcileOutcome::InvalidSignature => ("97", "Invalid signature"),
        };
        Ack::json(
            StatusCode::OK,
            json!({ "RspCode": code, "Message": message }),
        )
    }

    fn raw_to_json(&self, raw: &[u8]) -> serde_json::Value {
        match Self::decode_params(raw) {
            Ok(params) => serde_json::Value::Object(
                params
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect(),
            ),
            Err(_) => json!({ "raw": String::from_utf8_lossy(raw) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::signing::hmac_sha512_hex;

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(VnpayConfig {
            tmn_code: "GLOWCART1".to_string(),
            hash_secret: "vnpay_secret".to_string(),
        })
    }

    fn signed_query(gw: &VnpayGateway, txn_ref: &str, amount_x100: i64, response_code: &str) -> String {
        let mut params = vec![
            ("vnp_Amount".to_string(), amount_x100.to_string()),
            ("vnp_BankCode".to_string(), "NCB".to_string()),
            ("vnp_OrderInfo".to_string(), "Thanh toan don hang".to_string()),
            ("vnp_PayDate".to_string(), "20260829102530".to_string()),
            ("vnp_ResponseCode".to_string(), response_code.to_string()),
            ("vnp_TmnCode".to_string(), "GLOWCART1".to_string()),
            ("vnp_TransactionNo".to_string(), "14405889".to_string()),
            ("vnp_TxnRef".to_string(), txn_ref.to_string()),
        ];
        let canonical = serde_urlencoded::to_string(&params).unwrap();
        let hash = hmac_sha512_hex(canonical.as_bytes(), &gw.config.hash_secret).unwrap();
        params.push(("vnp_SecureHash".to_string(), hash));
        serde_urlencoded::to_string(&params).unwrap()
    }

    #[test]
    fn valid_secure_hash_verifies() {
        let gw = gateway();
        let query = signed_query(&gw, "123", 25000000, "00");
        assert!(gw.verify(query.as_bytes()).valid);
    }

    #[test]
    fn verification_is_order_insensitive() {
        // The canonical string sorts keys, so parameter order on the wire
        // must not matter.
        let gw = gateway();
        let query = signed_query(&gw, "123", 25000000, "00");
        let mut params: Vec<(String, String)> =
            serde_urlencoded::from_str(&query).unwrap();
        params.reverse();
        let reordered = serde_urlencoded::to_string(&params).unwrap();
        assert!(gw.verify(reordered.as_bytes()).valid);
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let gw = gateway();
        let query = signed_query(&gw, "123", 25000000, "00").replace("25000000", "99999900");
        assert!(!gw.verify(query.as_bytes()).valid);
    }

    #[test]
    fn missing_secure_hash_fails_closed() {
        let gw = gateway();
        let query = "vnp_TxnRef=123&vnp_Amount=25000000&vnp_ResponseCode=00&vnp_TmnCode=GLOWCART1";
        assert!(!gw.verify(query.as_bytes()).valid);
    }

    #[test]
    fn parse_normalizes_scaled_amount() {
        let gw = gateway();
        let query = signed_query(&gw, "123", 25000000, "00");
        let parsed = gw.parse(query.as_bytes()).unwrap();
        assert_eq!(parsed.amount, BigDecimal::from(250000));
        assert_eq!(parsed.order_ref, "123");
        assert!(parsed.success);
        assert_eq!(parsed.provider_txn_id.as_deref(), Some("14405889"));
    }

    #[test]
    fn non_success_response_code_is_failure() {
        let gw = gateway();
        let query = signed_query(&gw, "123", 25000000, "24");
        let parsed = gw.parse(query.as_bytes()).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.result_code, "24");
    }

    #[test]
    fn ack_uses_vnpay_rsp_codes() {
        let gw = gateway();
        let ok = gw.ack(&ReconcileOutcome::Applied(
            crate::database::payment_attempt_repository::AttemptStatus::Successful,
        ));
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body.unwrap()["RspCode"], "00");

        let bad_sig = gw.ack(&ReconcileOutcome::InvalidSignature);
        assert_eq!(bad_sig.body.unwrap()["RspCode"], "97");

        let mismatch = gw.ack(&ReconcileOutcome::AmountMismatch {
            expected: BigDecimal::from(250000),
            reported: BigDecimal::from(999999),
        });
        assert_eq!(mismatch.body.unwrap()["RspCode"], "04");
    }
}
