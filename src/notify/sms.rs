// SMS side-channel
//
// Arkesel v2 API, api-key header auth. Sends are best-effort: a failed or
// slow SMS never affects the ledger write that triggered it.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::ledger::models::Transaction;

const ARKESEL_SMS_URL: &str = "https://sms.arkesel.com/api/v2/sms/send";

/// Arkesel SMS client
pub struct SmsClient {
    api_key: String,
    sender_id: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ArkeselSmsRequest {
    sender: String,
    message: String,
    recipients: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArkeselSmsResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl SmsClient {
    pub fn new(api_key: String, sender_id: String) -> Self {
        Self {
            api_key,
            sender_id,
            client: reqwest::Client::new(),
        }
    }

    /// Send one SMS via Arkesel
    pub async fn send_sms(&self, to: &str, message: &str) -> AppResult<()> {
        let request = ArkeselSmsRequest {
            sender: self.sender_id.clone(),
            message: message.to_string(),
            recipients: vec![to.to_string()],
        };

        let response = self
            .client
            .post(ARKESEL_SMS_URL)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalError(format!(
                "Arkesel API error: {}",
                error_text
            )));
        }

        let result: ArkeselSmsResponse = response.json().await?;
        if result.status != "success" {
            return Err(AppError::ExternalError(format!(
                "Arkesel rejected SMS: {}",
                result.message.unwrap_or_else(|| result.status.clone())
            )));
        }

        info!("📧 SMS sent to {}", to);
        Ok(())
    }

    /// Confirmation SMS after a transaction's votes are materialized
    pub async fn notify_votes_recorded(&self, transaction: &Transaction) -> AppResult<()> {
        let message = confirmation_message(transaction);
        self.send_sms(&transaction.voter_phone, &message).await
    }
}

fn confirmation_message(transaction: &Transaction) -> String {
    format!(
        "Your {} vote(s) have been recorded. Amount: GHS {}. Ref: {}. Thank you for voting!",
        transaction.vote_count, transaction.amount, transaction.reference
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{PaymentMethod, PaymentProvider, TransactionStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_confirmation_message_contents() {
        let transaction = Transaction {
            id: Uuid::new_v4(),
            reference: "USSD_123_456".to_string(),
            event_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            nominee_id: Uuid::new_v4(),
            voter_phone: "233245000000".to_string(),
            vote_count: 3,
            amount: dec!(3.00),
            payment_method: PaymentMethod::Ussd,
            provider: PaymentProvider::HubtelUssd,
            status: TransactionStatus::Completed,
            provider_ref: None,
            failure_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };

        let message = confirmation_message(&transaction);
        assert!(message.contains("3 vote(s)"));
        assert!(message.contains("GHS 3.00"));
        assert!(message.contains("USSD_123_456"));
    }
}
