use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::models::*;
use crate::{
    config::Config,
    error::{AppError, AppResult, ProviderError},
    ledger::{
        models::{NewTransaction, PaymentMethod, PaymentProvider, TransactionStatus, Vote},
        repository::LedgerRepository,
    },
    providers::{hubtel::HubtelClient, paystack::PaystackClient},
    webhooks::{
        hubtel::{HubtelCheckoutCallback, HubtelUssdCallback},
        paystack::{self, PaystackEvent},
        processor::{WebhookAck, WebhookProcessor},
        shortcode::ShortcodeCallback,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerRepository>,
    pub processor: Arc<WebhookProcessor>,
    pub hubtel: Option<Arc<HubtelClient>>,
    pub paystack: Option<Arc<PaystackClient>>,
    pub config: Arc<Config>,
}

/// Initiate a vote purchase
/// POST /api/v1/checkout
pub async fn initiate_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    request
        .validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let provider = match request.payment_method {
        PaymentMethod::MobileMoney => PaymentProvider::HubtelCheckout,
        PaymentMethod::Card => PaymentProvider::Paystack,
        PaymentMethod::Ussd => PaymentProvider::HubtelUssd,
    };

    let reference = generate_reference(request.payment_method);
    let amount = state.config.vote_price * rust_decimal::Decimal::from(request.vote_count);

    info!(
        "🧾 Initiating checkout: reference={} method={} votes={} amount={}",
        reference, request.payment_method, request.vote_count, amount
    );

    let transaction = state
        .ledger
        .create_transaction(NewTransaction {
            reference: reference.clone(),
            event_id: request.event_id,
            category_id: request.category_id,
            nominee_id: request.nominee_id,
            voter_phone: request.voter_phone.clone(),
            vote_count: request.vote_count,
            amount,
            payment_method: request.payment_method,
            provider,
        })
        .await?;

    let description = format!(
        "{} vote(s) for nominee {}",
        transaction.vote_count, transaction.nominee_id
    );

    // Hand the voter to the selected payment rail. A provider failure leaves
    // the pending row behind for the stale sweep.
    let (checkout_url, ussd_code, message) = match request.payment_method {
        PaymentMethod::MobileMoney => {
            let hubtel = state.hubtel.as_ref().ok_or_else(|| {
                ProviderError::NotConfigured("hubtel".to_string())
            })?;
            let session = hubtel
                .create_checkout(&transaction.reference, transaction.amount, &description)
                .await?;
            (
                Some(session.checkout_url),
                None,
                "Complete payment on the checkout page".to_string(),
            )
        }
        PaymentMethod::Card => {
            let paystack = state.paystack.as_ref().ok_or_else(|| {
                ProviderError::NotConfigured("paystack".to_string())
            })?;
            let email = request.email.as_deref().ok_or_else(|| {
                AppError::InvalidInput("email is required for card payments".to_string())
            })?;
            let authorization = paystack
                .initialize(&transaction.reference, transaction.amount, email)
                .await?;
            (
                Some(authorization.authorization_url),
                None,
                "Complete payment on the authorization page".to_string(),
            )
        }
        PaymentMethod::Ussd => (
            None,
            Some(state.config.ussd_shortcode.clone()),
            format!(
                "Dial {} and follow the prompts to pay",
                state.config.ussd_shortcode
            ),
        ),
    };

    Ok(Json(CheckoutResponse {
        reference: transaction.reference,
        status: transaction.status.to_string(),
        amount: transaction.amount.to_string(),
        vote_count: transaction.vote_count,
        checkout_url,
        ussd_code,
        message,
    }))
}

/// Transaction status by reference
/// GET /api/v1/transactions/:reference
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Json<TransactionStatusResponse>> {
    let mut transaction = state
        .ledger
        .get_transaction_by_reference(&reference)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {}", reference)))?;

    // Card payments without a webhook yet: ask Paystack directly, then feed
    // the answer through the same idempotent apply path the webhook uses
    if transaction.status == TransactionStatus::Pending
        && transaction.provider == PaymentProvider::Paystack
    {
        if let Some(paystack) = &state.paystack {
            match paystack.verify(&reference).await {
                Ok(charge) => {
                    match state.ledger.apply_payment_outcome(&charge.into_outcome()).await {
                        Ok(result) => transaction = result.into_transaction(),
                        Err(e) => warn!("On-demand verify apply failed for {}: {:?}", reference, e),
                    }
                }
                Err(e) => warn!("Paystack verify failed for {}: {:?}", reference, e),
            }
        }
    }

    let votes_recorded = state.ledger.count_votes(transaction.id).await?;

    Ok(Json(TransactionStatusResponse::from_parts(
        transaction,
        votes_recorded,
    )))
}

/// Individual vote units for a transaction
/// GET /api/v1/transactions/:reference/votes
pub async fn get_transaction_votes(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Json<Vec<Vote>>> {
    let transaction = state
        .ledger
        .get_transaction_by_reference(&reference)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {}", reference)))?;

    let votes = state.ledger.votes_for_transaction(transaction.id).await?;
    Ok(Json(votes))
}

/// Hubtel checkout callback
/// POST /api/v1/webhooks/hubtel
pub async fn hubtel_webhook(
    State(state): State<AppState>,
    Json(callback): Json<HubtelCheckoutCallback>,
) -> AppResult<(StatusCode, Json<WebhookAck>)> {
    let ack = state.processor.process_async(callback.into_outcome());
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// Hubtel USSD order callback
/// POST /api/v1/webhooks/hubtel-ussd
pub async fn hubtel_ussd_webhook(
    State(state): State<AppState>,
    Json(callback): Json<HubtelUssdCallback>,
) -> AppResult<(StatusCode, Json<WebhookAck>)> {
    let outcome = callback.into_outcome()?;
    let ack = state.processor.process_async(outcome);
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// Paystack webhook (signed)
/// POST /api/v1/webhooks/paystack
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<WebhookAck>)> {
    let secret = state
        .config
        .paystack_secret_key
        .as_deref()
        .ok_or_else(|| ProviderError::NotConfigured("paystack".to_string()))?;

    let signature = headers
        .get(paystack::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ProviderError::InvalidSignature)?;

    if !paystack::verify_signature(&body, signature, secret) {
        return Err(ProviderError::InvalidSignature.into());
    }

    let event: PaystackEvent = serde_json::from_slice(&body)
        .map_err(|e| ProviderError::MalformedPayload(e.to_string()))?;

    if !event.is_charge_event() {
        info!("Ignoring Paystack event: {}", event.event);
        return Ok((
            StatusCode::OK,
            Json(WebhookAck {
                status: "ignored".to_string(),
                message: format!("Event {} is not a charge event", event.event),
                webhook_id: Uuid::new_v4().to_string(),
                reference: event.data.reference,
            }),
        ));
    }

    let ack = state.processor.process_async(event.into_outcome());
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// Shortcode aggregator callback
/// POST /api/v1/webhooks/shortcode
pub async fn shortcode_webhook(
    State(state): State<AppState>,
    Json(callback): Json<ShortcodeCallback>,
) -> AppResult<(StatusCode, Json<WebhookAck>)> {
    let outcome = callback.into_outcome()?;
    let ack = state.processor.process_async(outcome);
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// Vote tally for one nominee
/// GET /api/v1/tally/nominee/:nominee_id
pub async fn get_nominee_tally(
    State(state): State<AppState>,
    Path(nominee_id): Path<Uuid>,
) -> AppResult<Json<TallyResponse>> {
    let tally = state.ledger.nominee_tally(nominee_id).await?;
    Ok(Json(tally.into()))
}

/// Leaderboard for one event
/// GET /api/v1/tally/event/:event_id
pub async fn get_event_tally(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<EventTallyResponse>> {
    let tallies = state.ledger.event_tally(event_id).await?;
    Ok(Json(EventTallyResponse {
        event_id,
        nominees: tallies.into_iter().map(Into::into).collect(),
    }))
}

/// Health check
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

/// Provider-agnostic reference, e.g. "USSD_1722430000_381220"
fn generate_reference(method: PaymentMethod) -> String {
    let nonce: u32 = rand::rng().random_range(100_000..1_000_000);
    format!(
        "{}_{}_{}",
        method.reference_prefix(),
        Utc::now().timestamp(),
        nonce
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let reference = generate_reference(PaymentMethod::Ussd);
        let parts: Vec<&str> = reference.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "USSD");
        assert!(parts[1].parse::<i64>().is_ok());
        let nonce: u32 = parts[2].parse().unwrap();
        assert!((100_000..1_000_000).contains(&nonce));
    }

    #[test]
    fn test_reference_prefix_follows_method() {
        assert!(generate_reference(PaymentMethod::Card).starts_with("CARD_"));
        assert!(generate_reference(PaymentMethod::MobileMoney).starts_with("MOMO_"));
    }
}
