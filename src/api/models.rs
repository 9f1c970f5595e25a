use crate::ledger::models::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ========== REQUEST MODELS ==========

/// Request to initiate a vote purchase
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub event_id: Uuid,
    pub category_id: Uuid,
    pub nominee_id: Uuid,

    #[validate(custom = "validate_msisdn")]
    pub voter_phone: String,

    #[validate(range(min = 1, max = 10000))]
    pub vote_count: i32,

    pub payment_method: PaymentMethod,

    /// Required for card payments (Paystack needs it)
    #[validate(email)]
    pub email: Option<String>,
}

fn validate_msisdn(value: &str) -> Result<(), ValidationError> {
    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.len() >= 9 && digits.len() <= 15 && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_msisdn"))
    }
}

// ========== RESPONSE MODELS ==========

/// Checkout initiation response
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub reference: String,
    pub status: String,
    pub amount: String,
    pub vote_count: i32,
    /// Hosted payment page (mobile money / card flows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    /// Shortcode to dial (USSD flow)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ussd_code: Option<String>,
    pub message: String,
}

/// Transaction status response
#[derive(Debug, Serialize)]
pub struct TransactionStatusResponse {
    pub reference: String,
    pub status: String,
    pub payment_method: String,
    pub provider: String,
    pub vote_count: i32,
    /// Votes actually materialized; equals vote_count once completed
    pub votes_recorded: i64,
    pub amount: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionStatusResponse {
    pub fn from_parts(transaction: Transaction, votes_recorded: i64) -> Self {
        Self {
            reference: transaction.reference,
            status: transaction.status.to_string(),
            payment_method: transaction.payment_method.to_string(),
            provider: transaction.provider.to_string(),
            vote_count: transaction.vote_count,
            votes_recorded,
            amount: transaction.amount.to_string(),
            failure_reason: transaction.failure_reason,
            created_at: transaction.created_at,
            completed_at: transaction.completed_at,
        }
    }
}

/// Per-nominee tally response
#[derive(Debug, Serialize)]
pub struct TallyResponse {
    pub nominee_id: Uuid,
    pub votes: i64,
    pub amount: String,
}

impl From<NomineeTally> for TallyResponse {
    fn from(tally: NomineeTally) -> Self {
        Self {
            nominee_id: tally.nominee_id,
            votes: tally.votes,
            amount: tally.amount.to_string(),
        }
    }
}

/// Event leaderboard response
#[derive(Debug, Serialize)]
pub struct EventTallyResponse {
    pub event_id: Uuid,
    pub nominees: Vec<TallyResponse>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(vote_count: i32, phone: &str, email: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            event_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            nominee_id: Uuid::new_v4(),
            voter_phone: phone.to_string(),
            vote_count,
            payment_method: PaymentMethod::MobileMoney,
            email: email.map(|e| e.to_string()),
        }
    }

    #[test]
    fn test_valid_checkout_request() {
        assert!(request(3, "233245000000", None).validate().is_ok());
        assert!(request(1, "+233245000000", Some("voter@example.com"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_zero_vote_count_rejected() {
        assert!(request(0, "233245000000", None).validate().is_err());
        assert!(request(-3, "233245000000", None).validate().is_err());
    }

    #[test]
    fn test_bad_phone_rejected() {
        assert!(request(1, "not-a-phone", None).validate().is_err());
        assert!(request(1, "12345", None).validate().is_err());
        assert!(request(1, "+2332450000001234567", None).validate().is_err());
    }

    #[test]
    fn test_bad_email_rejected() {
        assert!(request(1, "233245000000", Some("nope")).validate().is_err());
    }
}
