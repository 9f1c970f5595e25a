use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Payment transaction lifecycle
///
/// Completed, Failed and Cancelled are terminal. A transaction never leaves
/// a terminal state, in particular never back to Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Failed
                | TransactionStatus::Cancelled
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment rail selected by the voter at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    Ussd,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Ussd => "ussd",
            PaymentMethod::Card => "card",
        }
    }

    /// Reference prefix used when generating transaction references
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoney => "MOMO",
            PaymentMethod::Ussd => "USSD",
            PaymentMethod::Card => "CARD",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which provider integration owns a transaction's webhooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    HubtelCheckout,
    HubtelUssd,
    Paystack,
    Shortcode,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::HubtelCheckout => "hubtel_checkout",
            PaymentProvider::HubtelUssd => "hubtel_ussd",
            PaymentProvider::Paystack => "paystack",
            PaymentProvider::Shortcode => "shortcode",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction entity - one payment attempt tied to one voting purchase
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    /// Provider-agnostic correlation key, unique across the ledger
    pub reference: String,

    // Voting target (owned by the events service, stored opaquely)
    pub event_id: Uuid,
    pub category_id: Uuid,
    pub nominee_id: Uuid,

    pub voter_phone: String,
    pub vote_count: i32,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    pub payment_method: PaymentMethod,
    pub provider: PaymentProvider,
    pub status: TransactionStatus,

    /// Provider-side identifier (checkout id, charge id, session id)
    pub provider_ref: Option<String>,
    pub failure_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Per-unit amounts the materializer writes for this transaction
    pub fn unit_amounts(&self) -> Vec<Decimal> {
        split_amount(self.amount, self.vote_count)
    }
}

/// Insert parameters for a new pending transaction
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub reference: String,
    pub event_id: Uuid,
    pub category_id: Uuid,
    pub nominee_id: Uuid,
    pub voter_phone: String,
    pub vote_count: i32,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub provider: PaymentProvider,
}

/// Vote entity - one row per paid vote unit, never updated or deleted
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub event_id: Uuid,
    pub category_id: Uuid,
    pub nominee_id: Uuid,
    /// Position within the purchase (0..vote_count), part of the vote's
    /// uniqueness key so replays cannot double-insert
    pub unit_index: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Canonical payment status reported by a provider webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Completed,
    Failed,
    Pending,
}

impl OutcomeStatus {
    /// Ledger status this outcome drives the transaction toward
    pub fn target_status(&self) -> TransactionStatus {
        match self {
            OutcomeStatus::Completed => TransactionStatus::Completed,
            OutcomeStatus::Failed => TransactionStatus::Failed,
            OutcomeStatus::Pending => TransactionStatus::Processing,
        }
    }

    /// Shared status-vocabulary normalizer for provider payloads.
    ///
    /// Unknown words map to Pending: a vocabulary word we have never seen
    /// must not complete or fail a purchase.
    pub fn from_keyword(raw: &str) -> OutcomeStatus {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "paid" | "completed" | "approved" => {
                OutcomeStatus::Completed
            }
            "failed" | "failure" | "declined" | "cancelled" | "canceled" | "expired"
            | "reversed" | "abandoned" | "insufficient_funds" => OutcomeStatus::Failed,
            _ => OutcomeStatus::Pending,
        }
    }
}

/// Canonical (reference, status, amount, phone) tuple every webhook decoder
/// produces, whatever the provider's payload shape
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub reference: String,
    pub provider: PaymentProvider,
    pub status: OutcomeStatus,
    /// Amount the provider says was paid; checked against the ledger row
    pub amount: Option<Decimal>,
    pub phone: Option<String>,
    pub provider_ref: Option<String>,
    pub failure_reason: Option<String>,
}

/// Result of applying a payment outcome to the ledger
#[derive(Debug)]
pub enum ApplyResult {
    /// The transaction advanced; votes_created > 0 only on completion
    Applied {
        transaction: Transaction,
        votes_created: u64,
    },
    /// Duplicate delivery for a terminal transaction - nothing written
    AlreadyFinal(Transaction),
    /// Non-advancing status report (e.g. a second "pending") - nothing written
    Unchanged(Transaction),
}

impl ApplyResult {
    /// True only the first time a transaction reaches Completed - the one
    /// case that should trigger the SMS side-channel
    pub fn is_fresh_completion(&self) -> bool {
        matches!(
            self,
            ApplyResult::Applied { transaction, .. }
                if transaction.status == TransactionStatus::Completed
        )
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            ApplyResult::Applied { transaction, .. } => transaction,
            ApplyResult::AlreadyFinal(transaction) => transaction,
            ApplyResult::Unchanged(transaction) => transaction,
        }
    }
}

/// Per-nominee vote tally
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NomineeTally {
    pub nominee_id: Uuid,
    pub votes: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Split a paid amount into per-vote unit amounts.
///
/// Each unit gets the amount truncated to 2 decimal places; the final unit
/// absorbs the remainder so the units always sum to the original amount.
pub fn split_amount(total: Decimal, count: i32) -> Vec<Decimal> {
    if count <= 0 {
        return Vec::new();
    }

    let count_dec = Decimal::from(count);
    let base = (total / count_dec).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let mut units = vec![base; count as usize];

    let remainder = total - base * count_dec;
    if let Some(last) = units.last_mut() {
        *last += remainder;
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_amount_even() {
        // The USSD_123_456 scenario: 3.00 across 3 votes
        let units = split_amount(dec!(3.00), 3);
        assert_eq!(units, vec![dec!(1.00), dec!(1.00), dec!(1.00)]);
    }

    #[test]
    fn test_split_amount_remainder_on_last_unit() {
        let units = split_amount(dec!(1.00), 3);
        assert_eq!(units, vec![dec!(0.33), dec!(0.33), dec!(0.34)]);
    }

    #[test]
    fn test_split_amount_sums_exactly() {
        for (total, count) in [
            (dec!(3.00), 3),
            (dec!(10.00), 7),
            (dec!(0.05), 4),
            (dec!(99.99), 13),
            (dec!(25.50), 1),
        ] {
            let units = split_amount(total, count);
            assert_eq!(units.len(), count as usize);
            let sum: Decimal = units.iter().sum();
            assert_eq!(sum, total, "units of {} / {} must sum exactly", total, count);
        }
    }

    #[test]
    fn test_split_amount_rejects_non_positive_count() {
        assert!(split_amount(dec!(5.00), 0).is_empty());
        assert!(split_amount(dec!(5.00), -2).is_empty());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_outcome_keyword_normalization() {
        assert_eq!(OutcomeStatus::from_keyword("Success"), OutcomeStatus::Completed);
        assert_eq!(OutcomeStatus::from_keyword("  paid "), OutcomeStatus::Completed);
        assert_eq!(OutcomeStatus::from_keyword("DECLINED"), OutcomeStatus::Failed);
        assert_eq!(OutcomeStatus::from_keyword("abandoned"), OutcomeStatus::Failed);
        // Unknown vocabulary never advances a transaction to a terminal state
        assert_eq!(OutcomeStatus::from_keyword("in_review"), OutcomeStatus::Pending);
        assert_eq!(OutcomeStatus::from_keyword(""), OutcomeStatus::Pending);
    }

    #[test]
    fn test_outcome_target_status() {
        assert_eq!(
            OutcomeStatus::Completed.target_status(),
            TransactionStatus::Completed
        );
        assert_eq!(OutcomeStatus::Failed.target_status(), TransactionStatus::Failed);
        assert_eq!(
            OutcomeStatus::Pending.target_status(),
            TransactionStatus::Processing
        );
    }

    #[test]
    fn test_reference_prefixes() {
        assert_eq!(PaymentMethod::Ussd.reference_prefix(), "USSD");
        assert_eq!(PaymentMethod::MobileMoney.reference_prefix(), "MOMO");
        assert_eq!(PaymentMethod::Card.reference_prefix(), "CARD");
    }
}
