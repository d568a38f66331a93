use crate::database::error::DatabaseError;
use crate::database::store::PaymentRecordStore;
use crate::gateways::types::ProviderName;
use std::sync::Arc;

/// Prefixes providers prepend to the internal order id when building their
/// reference strings. Checked in order; longest first so the partner prefix
/// is not misread as a bare token.
const KNOWN_PREFIXES: &[&str] = &["Partner_Transaction_ID_", "ORDER_"];

/// Parse an internal order id out of a provider reference string.
///
/// Strips known prefixes, takes the token before the first remaining
/// separator, and parses it as an integer. `ORDER_123`, `123_1717000000`
/// and `Partner_Transaction_ID_123` all resolve to 123.
pub fn parse_order_ref(reference: &str) -> Option<i64> {
    let mut rest = reference.trim();
    for prefix in KNOWN_PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    let token = rest
        .split(|c: char| c == '_' || c == '-')
        .next()
        .unwrap_or(rest);
    token.parse::<i64>().ok()
}

/// Resolves provider reference strings to internal order ids.
///
/// Direct parsing handles references that embed the order id. Some providers
/// echo back an opaque reference of their own instead; for those the
/// resolver falls back to the mapping stored when the attempt was created.
pub struct OrderIdResolver {
    store: Arc<dyn PaymentRecordStore>,
}

impl OrderIdResolver {
    pub fn new(store: Arc<dyn PaymentRecordStore>) -> Self {
        Self { store }
    }

    /// `Ok(None)` means unresolvable, which the caller logs and drops. A
    /// store failure during the fallback lookup is propagated: only a
    /// rejection the provider must not retry may collapse to `None`.
    pub async fn resolve(
        &self,
        provider: ProviderName,
        reference: &str,
    ) -> Result<Option<i64>, DatabaseError> {
        if let Some(order_id) = parse_order_ref(reference) {
            return Ok(Some(order_id));
        }

        self.store
            .find_order_by_provider_ref(provider.as_str(), reference)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_numeric_reference() {
        assert_eq!(parse_order_ref("123"), Some(123));
    }

    #[test]
    fn strips_order_prefix() {
        assert_eq!(parse_order_ref("ORDER_123"), Some(123));
    }

    #[test]
    fn strips_partner_transaction_prefix() {
        assert_eq!(parse_order_ref("Partner_Transaction_ID_123"), Some(123));
    }

    #[test]
    fn takes_token_before_timestamp_suffix() {
        assert_eq!(parse_order_ref("123_1717000000"), Some(123));
        assert_eq!(parse_order_ref("ORDER_456_1717000000"), Some(456));
    }

    #[test]
    fn handles_dash_separators() {
        assert_eq!(parse_order_ref("789-retry-2"), Some(789));
    }

    #[test]
    fn rejects_non_numeric_references() {
        assert_eq!(parse_order_ref("abc"), None);
        assert_eq!(parse_order_ref("ORDER_abc"), None);
        assert_eq!(parse_order_ref(""), None);
    }
}
