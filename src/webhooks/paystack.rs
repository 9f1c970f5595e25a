use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha512;

use crate::ledger::models::{OutcomeStatus, PaymentOutcome, PaymentProvider};

type HmacSha512 = Hmac<Sha512>;

/// Header Paystack signs every webhook delivery with
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Paystack webhook envelope
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackEvent {
    pub event: String,
    pub data: PaystackChargeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaystackChargeData {
    pub reference: String,
    pub status: String,
    /// Paystack reports amounts in minor units (pesewas/kobo)
    pub amount: i64,
    pub currency: Option<String>,
    pub channel: Option<String>,
    pub gateway_response: Option<String>,
    pub id: Option<i64>,
    pub customer: Option<PaystackCustomer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaystackCustomer {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl PaystackEvent {
    /// Only charge events describe a payment outcome; transfers, disputes
    /// and the rest are acknowledged without processing
    pub fn is_charge_event(&self) -> bool {
        self.event.starts_with("charge.")
    }

    pub fn into_outcome(self) -> PaymentOutcome {
        self.data.into_outcome()
    }
}

impl PaystackChargeData {
    pub fn into_outcome(self) -> PaymentOutcome {
        let status = OutcomeStatus::from_keyword(&self.status);
        let failure_reason = match status {
            OutcomeStatus::Failed => Some(
                self.gateway_response
                    .clone()
                    .unwrap_or_else(|| format!("paystack: {}", self.status)),
            ),
            _ => None,
        };

        PaymentOutcome {
            reference: self.reference,
            provider: PaymentProvider::Paystack,
            status,
            amount: Some(minor_units_to_amount(self.amount)),
            phone: self.customer.and_then(|c| c.phone),
            provider_ref: self.id.map(|id| id.to_string()),
            failure_reason,
        }
    }
}

/// Convert Paystack minor units to the ledger's decimal amount
fn minor_units_to_amount(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Verify the HMAC-SHA512 signature Paystack computes over the raw body.
///
/// The raw body bytes must be used: re-serializing the parsed JSON does not
/// round-trip key order and breaks the digest.
pub fn verify_signature(body: &[u8], signature_hex: &str, secret: &str) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign(body, "sk_test_secret");

        assert!(verify_signature(body, &signature, "sk_test_secret"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign(body, "some_other_secret");

        assert!(!verify_signature(body, &signature, "sk_test_secret"));
    }

    #[test]
    fn test_modified_body_rejected() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign(body, "sk_test_secret");

        assert!(!verify_signature(
            br#"{"event":"charge.success","amount":1}"#,
            &signature,
            "sk_test_secret"
        ));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        assert!(!verify_signature(b"{}", "not-hex!", "sk_test_secret"));
        assert!(!verify_signature(b"{}", "", "sk_test_secret"));
    }

    #[test]
    fn test_charge_success_maps_to_completed() {
        let payload = serde_json::json!({
            "event": "charge.success",
            "data": {
                "id": 4099260516i64,
                "reference": "CARD_1722430000_552901",
                "status": "success",
                "amount": 300,
                "currency": "GHS",
                "channel": "card",
                "gateway_response": "Approved",
                "customer": { "phone": "+233245000000", "email": "voter@example.com" }
            }
        });

        let event: PaystackEvent = serde_json::from_value(payload).unwrap();
        assert!(event.is_charge_event());

        let outcome = event.into_outcome();
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.reference, "CARD_1722430000_552901");
        // 300 pesewas is 3.00
        assert_eq!(outcome.amount, Some(dec!(3.00)));
        assert_eq!(outcome.phone.as_deref(), Some("+233245000000"));
        assert_eq!(outcome.provider_ref.as_deref(), Some("4099260516"));
    }

    #[test]
    fn test_abandoned_charge_fails_with_gateway_reason() {
        let payload = serde_json::json!({
            "event": "charge.failed",
            "data": {
                "reference": "CARD_1722430000_552902",
                "status": "abandoned",
                "amount": 100,
                "gateway_response": "Customer closed the page"
            }
        });

        let event: PaystackEvent = serde_json::from_value(payload).unwrap();
        let outcome = event.into_outcome();

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(
            outcome.failure_reason.as_deref(),
            Some("Customer closed the page")
        );
    }

    #[test]
    fn test_non_charge_events_are_ignored() {
        let payload = serde_json::json!({
            "event": "transfer.success",
            "data": {
                "reference": "PAYOUT_09",
                "status": "success",
                "amount": 50000
            }
        });

        let event: PaystackEvent = serde_json::from_value(payload).unwrap();
        assert!(!event.is_charge_event());
    }

    #[test]
    fn test_ongoing_charge_stays_pending() {
        let data = PaystackChargeData {
            reference: "CARD_1_1".to_string(),
            status: "ongoing".to_string(),
            amount: 100,
            currency: None,
            channel: None,
            gateway_response: None,
            id: None,
            customer: None,
        };

        assert_eq!(data.into_outcome().status, OutcomeStatus::Pending);
    }

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(minor_units_to_amount(300), dec!(3.00));
        assert_eq!(minor_units_to_amount(1), dec!(0.01));
        assert_eq!(minor_units_to_amount(123456), dec!(1234.56));
    }
}
