//! Payment-intent client for the card processor's REST API.

use serde::Deserialize;

use crate::config::PaymentsConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: String,
}

/// Form fields for a new intent; metadata keys are flattened as `metadata[key]`
pub fn intent_form(amount: i64, currency: &str, metadata: &[(&str, String)]) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), amount.to_string()),
        ("currency".to_string(), currency.to_ascii_lowercase()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    for (key, value) in metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }
    form
}

#[derive(Clone)]
pub struct PaymentsClient {
    http: reqwest::Client,
    config: PaymentsConfig,
}

impl PaymentsClient {
    pub fn new(config: PaymentsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    fn ensure_configured(&self) -> Result<(), AppError> {
        if self.config.secret_key.is_empty() {
            return Err(AppError::Internal("Payments are not configured".to_string()));
        }
        Ok(())
    }

    pub async fn create_intent(
        &self,
        amount: i64,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent, AppError> {
        self.ensure_configured()?;

        let resp = self
            .http
            .post(format!("{}/v1/payment_intents", self.config.base_url))
            .bearer_auth(&self.config.secret_key)
            .form(&intent_form(amount, &self.config.currency, metadata))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Payment request failed: {}", e)))?;

        Self::parse(resp).await
    }

    pub async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, AppError> {
        self.ensure_configured()?;

        let resp = self
            .http
            .get(format!("{}/v1/payment_intents/{}", self.config.base_url, intent_id))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Payment request failed: {}", e)))?;

        Self::parse(resp).await
    }

    async fn parse(resp: reqwest::Response) -> Result<PaymentIntent, AppError> {
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<PaymentIntent>()
                .await
                .map_err(|e| AppError::Internal(format!("Invalid payment response: {}", e)));
        }

        let message = resp
            .json::<ProviderErrorBody>()
            .await
            .map(|body| body.error.message)
            .unwrap_or_default();

        if status.is_client_error() && !message.is_empty() {
            // Card and validation errors from the processor are user-facing
            Err(AppError::Upstream(message))
        } else {
            Err(AppError::Internal(format!(
                "Payment provider returned {}: {}",
                status, message
            )))
        }
    }
}
