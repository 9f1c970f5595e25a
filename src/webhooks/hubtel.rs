use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::ledger::models::{OutcomeStatus, PaymentOutcome, PaymentProvider};

/// Hubtel posts this to the checkout callback URL once an invoice settles
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HubtelCheckoutCallback {
    pub response_code: String,
    pub status: Option<String>,
    pub data: HubtelCheckoutData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HubtelCheckoutData {
    pub checkout_id: Option<String>,
    pub sales_invoice_id: Option<String>,
    /// Our transaction reference, echoed back by Hubtel
    pub client_reference: String,
    pub status: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub customer_phone_number: Option<String>,
    pub description: Option<String>,
}

impl HubtelCheckoutCallback {
    pub fn into_outcome(self) -> PaymentOutcome {
        let status = map_checkout_status(&self.response_code, &self.data.status);
        let failure_reason = match status {
            OutcomeStatus::Failed => Some(format!(
                "hubtel response {}: {}",
                self.response_code, self.data.status
            )),
            _ => None,
        };

        PaymentOutcome {
            reference: self.data.client_reference,
            provider: PaymentProvider::HubtelCheckout,
            status,
            amount: Some(self.data.amount),
            phone: self.data.customer_phone_number,
            provider_ref: self.data.checkout_id.or(self.data.sales_invoice_id),
            failure_reason,
        }
    }
}

/// Hubtel checkout result codes: 0000 settled, 2001 still pending,
/// anything else is a failure
fn map_checkout_status(response_code: &str, status: &str) -> OutcomeStatus {
    match response_code {
        "0000" => match OutcomeStatus::from_keyword(status) {
            // 0000 with an unknown status word is still a settled invoice
            OutcomeStatus::Pending => OutcomeStatus::Completed,
            resolved => resolved,
        },
        "2001" => OutcomeStatus::Pending,
        _ => OutcomeStatus::Failed,
    }
}

/// Hubtel USSD order callback (programmable services flow)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HubtelUssdCallback {
    pub session_id: Option<String>,
    pub order_id: Option<String>,
    pub order_info: HubtelUssdOrderInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HubtelUssdOrderInfo {
    pub customer_mobile_number: Option<String>,
    pub status: String,
    pub payment: HubtelUssdPayment,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HubtelUssdPayment {
    pub payment_type: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    pub payment_date: Option<String>,
    pub is_successful: bool,
    /// Our transaction reference when the menu flow carries one
    pub client_reference: Option<String>,
}

impl HubtelUssdCallback {
    pub fn into_outcome(self) -> Result<PaymentOutcome, ProviderError> {
        let reference = self
            .order_info
            .payment
            .client_reference
            .clone()
            .or(self.order_id.clone())
            .ok_or_else(|| {
                ProviderError::MalformedPayload(
                    "USSD callback carries neither ClientReference nor OrderId".to_string(),
                )
            })?;

        let status = map_ussd_status(&self.order_info);
        let failure_reason = match status {
            OutcomeStatus::Failed => Some(format!("hubtel ussd: {}", self.order_info.status)),
            _ => None,
        };

        Ok(PaymentOutcome {
            reference,
            provider: PaymentProvider::HubtelUssd,
            status,
            amount: Some(self.order_info.payment.amount_paid),
            phone: self.order_info.customer_mobile_number,
            provider_ref: self.session_id,
            failure_reason,
        })
    }
}

/// The order status string is authoritative for in-flight sessions; the
/// payment flag settles the rest
fn map_ussd_status(order: &HubtelUssdOrderInfo) -> OutcomeStatus {
    match OutcomeStatus::from_keyword(&order.status) {
        OutcomeStatus::Pending if order.payment.is_successful => OutcomeStatus::Completed,
        OutcomeStatus::Pending => OutcomeStatus::Pending,
        resolved => resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_checkout_success_maps_to_completed() {
        let payload = serde_json::json!({
            "ResponseCode": "0000",
            "Status": "Success",
            "Data": {
                "CheckoutId": "co_81723",
                "ClientReference": "MOMO_1722430000_381220",
                "Status": "Success",
                "Amount": 3.00,
                "CustomerPhoneNumber": "233245000000",
                "Description": "3 votes"
            }
        });

        let callback: HubtelCheckoutCallback = serde_json::from_value(payload).unwrap();
        let outcome = callback.into_outcome();

        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.reference, "MOMO_1722430000_381220");
        assert_eq!(outcome.amount, Some(dec!(3.00)));
        assert_eq!(outcome.provider, PaymentProvider::HubtelCheckout);
        assert_eq!(outcome.provider_ref.as_deref(), Some("co_81723"));
        assert!(outcome.failure_reason.is_none());
    }

    #[test]
    fn test_checkout_non_success_code_fails() {
        let payload = serde_json::json!({
            "ResponseCode": "4010",
            "Data": {
                "ClientReference": "MOMO_1722430000_381221",
                "Status": "Failed",
                "Amount": 1.00
            }
        });

        let callback: HubtelCheckoutCallback = serde_json::from_value(payload).unwrap();
        let outcome = callback.into_outcome();

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.failure_reason.unwrap().contains("4010"));
    }

    #[test]
    fn test_checkout_pending_code_does_not_settle() {
        assert_eq!(map_checkout_status("2001", "pending"), OutcomeStatus::Pending);
        // 0000 wins even when the status word is unfamiliar
        assert_eq!(map_checkout_status("0000", "Charged"), OutcomeStatus::Completed);
    }

    #[test]
    fn test_ussd_successful_payment_completes() {
        let payload = serde_json::json!({
            "SessionId": "ussd-session-9912",
            "OrderId": "USSD_123_456",
            "OrderInfo": {
                "CustomerMobileNumber": "233201111111",
                "Status": "Paid",
                "Payment": {
                    "PaymentType": "mobilemoney",
                    "AmountPaid": 3.00,
                    "IsSuccessful": true
                }
            }
        });

        let callback: HubtelUssdCallback = serde_json::from_value(payload).unwrap();
        let outcome = callback.into_outcome().unwrap();

        assert_eq!(outcome.reference, "USSD_123_456");
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.amount, Some(dec!(3.00)));
        assert_eq!(outcome.provider_ref.as_deref(), Some("ussd-session-9912"));
    }

    #[test]
    fn test_ussd_unpaid_session_stays_pending() {
        let payload = serde_json::json!({
            "OrderId": "USSD_123_457",
            "OrderInfo": {
                "Status": "AwaitingPayment",
                "Payment": {
                    "AmountPaid": 2.00,
                    "IsSuccessful": false
                }
            }
        });

        let callback: HubtelUssdCallback = serde_json::from_value(payload).unwrap();
        let outcome = callback.into_outcome().unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Pending);
    }

    #[test]
    fn test_ussd_missing_reference_is_rejected() {
        let payload = serde_json::json!({
            "OrderInfo": {
                "Status": "Paid",
                "Payment": { "AmountPaid": 1.00, "IsSuccessful": true }
            }
        });

        let callback: HubtelUssdCallback = serde_json::from_value(payload).unwrap();
        assert!(matches!(
            callback.into_outcome(),
            Err(ProviderError::MalformedPayload(_))
        ));
    }
}
