use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::{
    api::handlers::AppState,
    config::Config,
    error::AppResult,
    ledger::repository::LedgerRepository,
    notify::sms::SmsClient,
    providers::{hubtel::HubtelClient, paystack::PaystackClient},
    webhooks::processor::WebhookProcessor,
};

/// How long a pending transaction may wait for a payment result before the
/// sweep cancels it
const STALE_PENDING_HOURS: i64 = 24;

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Database pool
    let pool = initialize_database(&config.database_url).await?;

    // Core components
    let ledger = Arc::new(LedgerRepository::new(pool.clone()));

    // SMS side-channel
    let sms = match &config.arkesel_api_key {
        Some(api_key) => {
            let client = Arc::new(SmsClient::new(
                api_key.clone(),
                config.sms_sender_id.clone(),
            ));
            info!("✅ Arkesel SMS client initialized");
            Some(client)
        }
        None => {
            warn!("⚠️  ARKESEL_API_KEY not set - SMS notifications disabled");
            None
        }
    };

    // One apply path for every provider webhook
    let processor = Arc::new(WebhookProcessor::new(ledger.clone(), sms));
    info!("✅ Webhook processor initialized");

    info!("⚙️  Initializing payment providers...");

    let hubtel = match (
        &config.hubtel_client_id,
        &config.hubtel_client_secret,
        &config.hubtel_merchant_account,
    ) {
        (Some(client_id), Some(client_secret), Some(merchant_account)) => {
            let client = Arc::new(HubtelClient::new(
                client_id.clone(),
                client_secret.clone(),
                merchant_account.clone(),
                config.checkout_callback_url.clone(),
                config.checkout_return_url.clone(),
            ));
            info!("✅ Hubtel checkout client registered");
            Some(client)
        }
        _ => {
            warn!("⚠️  HUBTEL credentials not set - mobile money checkout disabled");
            None
        }
    };

    let paystack = match &config.paystack_secret_key {
        Some(secret_key) => {
            let client = Arc::new(PaystackClient::new(
                secret_key.clone(),
                config.checkout_return_url.clone(),
            ));
            info!("✅ Paystack client registered");
            Some(client)
        }
        None => {
            warn!("⚠️  PAYSTACK_SECRET_KEY not set - card payments disabled");
            None
        }
    };

    let state = AppState {
        ledger: ledger.clone(),
        processor,
        hubtel,
        paystack,
        config: Arc::new(config.clone()),
    };

    // Start background task to cancel stale pending transactions (hourly)
    let ledger_cleanup = ledger.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;

            match ledger_cleanup
                .cancel_stale_pending(chrono::Duration::hours(STALE_PENDING_HOURS))
                .await
            {
                Ok(count) => {
                    if count > 0 {
                        info!("🗑️  Cancelled {} stale pending transactions", count);
                    }
                }
                Err(e) => error!("Failed to cancel stale transactions: {:?}", e),
            }
        }
    });
    info!("✅ Stale transaction sweep started (hourly)");

    Ok(state)
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(50)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    // Run migrations
    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
