use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,

    /// Price of a single vote, in the platform currency (GHS)
    pub vote_price: Decimal,

    /// Hubtel checkout credentials (mobile money). Checkout is disabled when unset.
    pub hubtel_client_id: Option<String>,
    pub hubtel_client_secret: Option<String>,
    pub hubtel_merchant_account: Option<String>,

    /// Paystack secret key (card payments + webhook signature). Disabled when unset.
    pub paystack_secret_key: Option<String>,

    /// Arkesel SMS credentials. SMS notifications are disabled when unset.
    pub arkesel_api_key: Option<String>,
    pub sms_sender_id: String,

    /// URLs handed to the payment providers at checkout initiation
    pub checkout_callback_url: String,
    pub checkout_return_url: String,

    /// Shortcode voters dial for the USSD flow
    pub ussd_shortcode: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let vote_price = std::env::var("VOTE_PRICE").unwrap_or_else(|_| "1.00".to_string());
        let vote_price = Decimal::from_str(&vote_price)
            .map_err(|e| config::ConfigError::Message(format!("invalid VOTE_PRICE: {}", e)))?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/votecast".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            vote_price,
            hubtel_client_id: std::env::var("HUBTEL_CLIENT_ID").ok(),
            hubtel_client_secret: std::env::var("HUBTEL_CLIENT_SECRET").ok(),
            hubtel_merchant_account: std::env::var("HUBTEL_MERCHANT_ACCOUNT").ok(),
            paystack_secret_key: std::env::var("PAYSTACK_SECRET_KEY").ok(),
            arkesel_api_key: std::env::var("ARKESEL_API_KEY").ok(),
            sms_sender_id: std::env::var("SMS_SENDER_ID")
                .unwrap_or_else(|_| "Votecast".to_string()),
            checkout_callback_url: std::env::var("CHECKOUT_CALLBACK_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api/v1/webhooks/hubtel".to_string()),
            checkout_return_url: std::env::var("CHECKOUT_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:8080/payment/complete".to_string()),
            ussd_shortcode: std::env::var("USSD_SHORTCODE")
                .unwrap_or_else(|_| "*713*44#".to_string()),
        })
    }
}
