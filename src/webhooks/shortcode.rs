use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::ledger::models::{OutcomeStatus, PaymentOutcome, PaymentProvider};

/// Flat payload posted by the shortcode/USSD aggregator
#[derive(Debug, Clone, Deserialize)]
pub struct ShortcodeCallback {
    pub reference: Option<String>,
    /// Some aggregator versions post the reference under transaction_id
    pub transaction_id: Option<String>,
    pub status: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    pub msisdn: Option<String>,
    pub network: Option<String>,
    pub message: Option<String>,
}

impl ShortcodeCallback {
    pub fn into_outcome(self) -> Result<PaymentOutcome, ProviderError> {
        let reference = self
            .reference
            .or(self.transaction_id)
            .ok_or_else(|| {
                ProviderError::MalformedPayload(
                    "shortcode callback carries no reference".to_string(),
                )
            })?;

        let status = OutcomeStatus::from_keyword(&self.status);
        let failure_reason = match status {
            OutcomeStatus::Failed => {
                Some(self.message.unwrap_or_else(|| format!("shortcode: {}", self.status)))
            }
            _ => None,
        };

        Ok(PaymentOutcome {
            reference,
            provider: PaymentProvider::Shortcode,
            status,
            amount: self.amount,
            phone: self.msisdn,
            provider_ref: self.network,
            failure_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_paid_callback_completes() {
        let payload = serde_json::json!({
            "reference": "USSD_123_456",
            "status": "PAID",
            "amount": 3.00,
            "msisdn": "233209999999",
            "network": "MTN"
        });

        let callback: ShortcodeCallback = serde_json::from_value(payload).unwrap();
        let outcome = callback.into_outcome().unwrap();

        assert_eq!(outcome.reference, "USSD_123_456");
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.amount, Some(dec!(3.00)));
        assert_eq!(outcome.provider, PaymentProvider::Shortcode);
    }

    #[test]
    fn test_transaction_id_is_accepted_as_reference() {
        let payload = serde_json::json!({
            "transaction_id": "USSD_123_457",
            "status": "insufficient_funds",
            "message": "Balance too low"
        });

        let callback: ShortcodeCallback = serde_json::from_value(payload).unwrap();
        let outcome = callback.into_outcome().unwrap();

        assert_eq!(outcome.reference, "USSD_123_457");
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.failure_reason.as_deref(), Some("Balance too low"));
    }

    #[test]
    fn test_missing_reference_is_rejected() {
        let payload = serde_json::json!({ "status": "success" });

        let callback: ShortcodeCallback = serde_json::from_value(payload).unwrap();
        assert!(matches!(
            callback.into_outcome(),
            Err(ProviderError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_amount_is_optional() {
        let payload = serde_json::json!({
            "reference": "USSD_9_9",
            "status": "success"
        });

        let callback: ShortcodeCallback = serde_json::from_value(payload).unwrap();
        let outcome = callback.into_outcome().unwrap();

        // No amount reported: the ledger row's amount stands unchecked
        assert_eq!(outcome.amount, None);
        assert_eq!(outcome.status, OutcomeStatus::Completed);
    }
}
