use crate::config::EmailConfig;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("email service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("email service responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// Payment confirmation message sent after a successful reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentConfirmation {
    pub to_email: String,
    pub order_id: i64,
    pub amount: BigDecimal,
    pub payment_method: String,
}

/// Outbound notification seam. The engine treats delivery as best-effort;
/// errors from implementations are logged by the caller, never propagated
/// into payment state.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_payment_confirmation(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<(), NotificationError>;
}

/// Dispatcher posting confirmations to the internal email service.
pub struct HttpEmailNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpEmailNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.service_url.trim_end_matches('/').to_string(),
            token: config.service_token.clone(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for HttpEmailNotifier {
    async fn send_payment_confirmation(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<(), NotificationError> {
        let url = format!("{}/emails/payment-confirmation", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(confirmation)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotificationError::Status(response.status()));
        }
        Ok(())
    }
}

/// Fallback dispatcher used when no email service is configured. Keeps the
/// confirmation visible in the logs so nothing is silently dropped.
pub struct LogOnlyNotifier;

#[async_trait]
impl NotificationDispatcher for LogOnlyNotifier {
    async fn send_payment_confirmation(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<(), NotificationError> {
        info!(
            order_id = confirmation.order_id,
            to = %confirmation.to_email,
            amount = %confirmation.amount,
            method = %confirmation.payment_method,
            "🔔 NOTIFICATION: payment confirmation (email service not configured)"
        );
        Ok(())
    }
}
