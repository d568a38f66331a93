use crate::gateways::error::GatewayResult;
use crate::gateways::types::{ParsedCallback, ProviderName, VerificationResult};
use crate::services::reconciliation::ReconcileOutcome;
use http::StatusCode;
use serde_json::Value as JsonValue;

/// Acknowledgement returned to the provider for one callback delivery.
///
/// Each provider defines the response shape that stops its retry loop, so
/// the gateway owns the mapping from reconciliation outcome to wire reply.
#[derive(Debug, Clone)]
pub struct Ack {
    pub status: StatusCode,
    pub body: Option<JsonValue>,
}

impl Ack {
    pub fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }
}

/// One payment provider's callback contract: MAC verification, payload
/// parsing, and the acknowledgement shape the provider expects back.
///
/// Implementations are pure with respect to application state; they never
/// touch the database and never panic on untrusted input.
pub trait CallbackGateway: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Authenticates a raw callback body. Fails closed: unparseable input,
    /// missing fields, or a MAC mismatch all yield an invalid result.
    fn verify(&self, raw: &[u8]) -> VerificationResult;

    /// Extracts the provider-neutral callback view from a raw body. Callers
    /// must only trust the result after `verify` succeeded.
    fn parse(&self, raw: &[u8]) -> GatewayResult<ParsedCallback>;

    /// Provider-shaped acknowledgement for the given reconciliation outcome.
    fn ack(&self, outcome: &ReconcileOutcome) -> Ack;

    /// Best-effort JSON rendering of the raw body for the audit trail.
    fn raw_to_json(&self, raw: &[u8]) -> JsonValue {
        serde_json::from_slice(raw).unwrap_or_else(|_| {
            serde_json::json!({ "raw": String::from_utf8_lossy(raw) })
        })
    }
}
