use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult, ProviderError};
use crate::webhooks::paystack::PaystackChargeData;

const PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

/// Paystack client (card payments)
pub struct PaystackClient {
    secret_key: String,
    callback_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct InitializeRequest {
    email: String,
    /// Minor units (pesewas)
    amount: i64,
    reference: String,
    currency: String,
    callback_url: String,
    channels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

/// Card authorization handed back to the voter
#[derive(Debug, Clone, Serialize)]
pub struct PaystackAuthorization {
    pub authorization_url: String,
    pub access_code: String,
}

impl PaystackClient {
    pub fn new(secret_key: String, callback_url: String) -> Self {
        Self {
            secret_key,
            callback_url,
            client: reqwest::Client::new(),
        }
    }

    /// Initialize a card transaction, returning the hosted authorization URL
    pub async fn initialize(
        &self,
        reference: &str,
        amount: Decimal,
        email: &str,
    ) -> AppResult<PaystackAuthorization> {
        let request = InitializeRequest {
            email: email.to_string(),
            amount: to_minor_units(amount)?,
            reference: reference.to_string(),
            currency: "GHS".to_string(),
            callback_url: self.callback_url.clone(),
            channels: vec!["card".to_string()],
        };

        let data: InitializeData = self
            .post_json("/transaction/initialize", &request)
            .await?;

        info!(
            "💳 Paystack transaction initialized: reference={} access_code={}",
            data.reference, data.access_code
        );

        Ok(PaystackAuthorization {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
        })
    }

    /// Query a charge's current state (used by the status route for
    /// transactions whose webhook has not arrived yet)
    pub async fn verify(&self, reference: &str) -> AppResult<PaystackChargeData> {
        let url = format!("{}/transaction/verify/{}", PAYSTACK_BASE_URL, reference);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                provider: "paystack".to_string(),
                message: error_text,
            }
            .into());
        }

        let envelope: PaystackEnvelope<PaystackChargeData> = response.json().await?;
        envelope_data(envelope)
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<T> {
        let url = format!("{}{}", PAYSTACK_BASE_URL, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                provider: "paystack".to_string(),
                message: error_text,
            }
            .into());
        }

        let envelope: PaystackEnvelope<T> = response.json().await?;
        envelope_data(envelope)
    }
}

fn envelope_data<T>(envelope: PaystackEnvelope<T>) -> AppResult<T> {
    if !envelope.status {
        return Err(ProviderError::Rejected {
            provider: "paystack".to_string(),
            message: envelope.message,
        }
        .into());
    }

    envelope.data.ok_or_else(|| {
        ProviderError::Rejected {
            provider: "paystack".to_string(),
            message: "success response without data".to_string(),
        }
        .into()
    })
}

/// Ledger amounts are decimal GHS; Paystack wants integer pesewas
fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    let minor = amount * dec!(100);
    if minor.fract() != Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "amount {} has sub-pesewa precision",
            amount
        )));
    }

    minor
        .to_i64()
        .ok_or_else(|| AppError::InvalidInput(format!("amount {} out of range", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(dec!(3.00)).unwrap(), 300);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(1234.56)).unwrap(), 123456);
    }

    #[test]
    fn test_sub_pesewa_precision_rejected() {
        assert!(to_minor_units(dec!(1.005)).is_err());
    }

    #[test]
    fn test_rejected_envelope_surfaces_message() {
        let envelope: PaystackEnvelope<InitializeData> = PaystackEnvelope {
            status: false,
            message: "Invalid key".to_string(),
            data: None,
        };

        let result = envelope_data(envelope);
        assert!(matches!(
            result,
            Err(AppError::Provider(ProviderError::Rejected { .. }))
        ));
    }
}
