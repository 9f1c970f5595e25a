use base64::Engine;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppResult, ProviderError};

const HUBTEL_INITIATE_URL: &str = "https://payproxyapi.hubtel.com/items/initiate";

/// Hubtel hosted-checkout client (mobile money)
pub struct HubtelClient {
    client_id: String,
    client_secret: String,
    merchant_account: String,
    callback_url: String,
    return_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateInvoiceRequest {
    total_amount: Decimal,
    description: String,
    callback_url: String,
    return_url: String,
    merchant_account_number: String,
    client_reference: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInvoiceResponse {
    response_code: String,
    #[serde(default)]
    status: Option<String>,
    data: Option<InvoiceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceData {
    checkout_url: String,
    checkout_id: String,
    client_reference: String,
}

/// Hosted checkout session handed back to the voter
#[derive(Debug, Clone, Serialize)]
pub struct HubtelCheckoutSession {
    pub checkout_url: String,
    pub checkout_id: String,
}

impl HubtelClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        merchant_account: String,
        callback_url: String,
        return_url: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            merchant_account,
            callback_url,
            return_url,
            client: reqwest::Client::new(),
        }
    }

    fn basic_auth_token(&self) -> String {
        let engine = base64::engine::general_purpose::STANDARD;
        engine.encode(format!("{}:{}", self.client_id, self.client_secret))
    }

    /// Create a hosted checkout invoice for a pending transaction
    pub async fn create_checkout(
        &self,
        reference: &str,
        amount: Decimal,
        description: &str,
    ) -> AppResult<HubtelCheckoutSession> {
        let request = CreateInvoiceRequest {
            total_amount: amount,
            description: description.to_string(),
            callback_url: self.callback_url.clone(),
            return_url: self.return_url.clone(),
            merchant_account_number: self.merchant_account.clone(),
            client_reference: reference.to_string(),
        };

        let response = self
            .client
            .post(HUBTEL_INITIATE_URL)
            .header("Authorization", format!("Basic {}", self.basic_auth_token()))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                provider: "hubtel".to_string(),
                message: error_text,
            }
            .into());
        }

        let result: CreateInvoiceResponse = response.json().await?;

        if result.response_code != "0000" {
            return Err(ProviderError::Rejected {
                provider: "hubtel".to_string(),
                message: format!(
                    "response {}: {}",
                    result.response_code,
                    result.status.unwrap_or_default()
                ),
            }
            .into());
        }

        let data = result.data.ok_or_else(|| ProviderError::Rejected {
            provider: "hubtel".to_string(),
            message: "success response without checkout data".to_string(),
        })?;

        info!(
            "💳 Hubtel checkout created: reference={} checkout_id={}",
            data.client_reference, data.checkout_id
        );

        Ok(HubtelCheckoutSession {
            checkout_url: data.checkout_url,
            checkout_id: data.checkout_id,
        })
    }
}
