use serde::Serialize;
use std::sync::Arc;
use tokio::spawn;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::ledger::{
    models::{ApplyResult, PaymentOutcome},
    repository::LedgerRepository,
};
use crate::notify::sms::SmsClient;

/// Webhook response - acknowledged immediately, processed in background
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: String,
    pub message: String,
    pub webhook_id: String,
    pub reference: String,
}

/// Async webhook processor - one apply path for every provider.
///
/// Decoded outcomes are acknowledged right away and applied to the ledger in
/// a background task; providers see a 2xx whether or not the delivery turns
/// out to be a duplicate. The SMS side-channel fires only on the delivery
/// that actually completed the transaction.
pub struct WebhookProcessor {
    ledger: Arc<LedgerRepository>,
    sms: Option<Arc<SmsClient>>,
}

impl WebhookProcessor {
    pub fn new(ledger: Arc<LedgerRepository>, sms: Option<Arc<SmsClient>>) -> Self {
        Self { ledger, sms }
    }

    /// Accept an outcome and return the ack immediately
    pub fn process_async(&self, outcome: PaymentOutcome) -> WebhookAck {
        let ledger = self.ledger.clone();
        let sms = self.sms.clone();
        let webhook_id = Uuid::new_v4().to_string();
        let reference = outcome.reference.clone();

        let task_reference = reference.clone();
        spawn(async move {
            if let Err(e) = Self::process_background(ledger, sms, outcome).await {
                error!("Webhook processing error for {}: {:?}", task_reference, e);
            }
        });

        WebhookAck {
            status: "accepted".to_string(),
            message: "Webhook received and queued for processing".to_string(),
            webhook_id,
            reference,
        }
    }

    /// Apply the outcome and fire the side-channel
    async fn process_background(
        ledger: Arc<LedgerRepository>,
        sms: Option<Arc<SmsClient>>,
        outcome: PaymentOutcome,
    ) -> AppResult<()> {
        info!(
            "⚙️  Processing webhook: reference={} provider={} status={:?}",
            outcome.reference, outcome.provider, outcome.status
        );

        let result = ledger.apply_payment_outcome(&outcome).await?;

        if result.is_fresh_completion() {
            if let ApplyResult::Applied {
                transaction,
                votes_created,
            } = &result
            {
                info!(
                    "🗳️  {} votes materialized for {}",
                    votes_created, transaction.reference
                );

                // Best-effort: the votes are already committed, an SMS failure
                // only loses the courtesy message
                if let Some(sms) = sms {
                    if let Err(e) = sms.notify_votes_recorded(transaction).await {
                        warn!("SMS send failed for {}: {:?}", transaction.reference, e);
                    }
                } else {
                    info!(
                        "SMS disabled, skipping confirmation for {}",
                        transaction.reference
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_format() {
        let ack = WebhookAck {
            status: "accepted".to_string(),
            message: "Test".to_string(),
            webhook_id: Uuid::new_v4().to_string(),
            reference: "USSD_123_456".to_string(),
        };

        assert_eq!(ack.status, "accepted");
        assert!(!ack.webhook_id.is_empty());
        assert_eq!(ack.reference, "USSD_123_456");
    }
}
