use crate::gateways::error::GatewayError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payment providers whose asynchronous notifications (IPNs) this service
/// reconciles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Momo,
    Vnpay,
    Zalopay,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Momo => "momo",
            ProviderName::Vnpay => "vnpay",
            ProviderName::Zalopay => "zalopay",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "momo" => Ok(ProviderName::Momo),
            "vnpay" => Ok(ProviderName::Vnpay),
            "zalopay" => Ok(ProviderName::Zalopay),
            _ => Err(GatewayError::UnknownProvider(value.to_string())),
        }
    }
}

/// Result of checking a callback's MAC against the shared secret.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

impl VerificationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Provider-neutral view of a verified callback, extracted by the gateway.
///
/// `order_ref` is the provider's reference string with provider-specific
/// framing (e.g. ZaloPay's date prefix) already removed; decoding the
/// embedded order id is the resolver's job.
#[derive(Debug, Clone)]
pub struct ParsedCallback {
    pub provider: ProviderName,
    pub order_ref: String,
    /// Transaction id assigned by the provider, absent on some failures.
    pub provider_txn_id: Option<String>,
    /// Reported amount in VND, normalized to whole units.
    pub amount: BigDecimal,
    pub success: bool,
    pub result_code: String,
    pub result_message: Option<String>,
}
