use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use http::{HeaderName, HeaderValue};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    api::handlers::{
        get_event_tally, get_nominee_tally, get_transaction, get_transaction_votes, health_check,
        hubtel_ussd_webhook, hubtel_webhook, initiate_checkout, paystack_webhook,
        shortcode_webhook, AppState,
    },
    middleware::rate_limit::{rate_limit_middleware, RateLimitLayer},
};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️  Setting up HTTP routes...");

    // Checkout is the only route the public hammers; quota it separately
    let checkout_limiter = Arc::new(RateLimitLayer::new(30, 60));

    let checkout_routes = Router::new()
        .route("/checkout", post(initiate_checkout))
        .route_layer(from_fn_with_state(checkout_limiter, rate_limit_middleware));

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            checkout_routes.merge(
                Router::new()
                    // Transaction status
                    .route("/transactions/:reference", get(get_transaction))
                    .route("/transactions/:reference/votes", get(get_transaction_votes))
                    // Webhook endpoints, one per provider payload shape
                    .route("/webhooks/hubtel", post(hubtel_webhook))
                    .route("/webhooks/hubtel-ussd", post(hubtel_ussd_webhook))
                    .route("/webhooks/paystack", post(paystack_webhook))
                    .route("/webhooks/shortcode", post(shortcode_webhook))
                    // Tally endpoints
                    .route("/tally/nominee/:nominee_id", get(get_nominee_tally))
                    .route("/tally/event/:event_id", get(get_event_tally)),
            ),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(CorsLayer::very_permissive()),
        )
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
