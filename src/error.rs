use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("External error: {0}")]
    ExternalError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Ledger/reconciliation errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),

    #[error("Transaction in invalid state: {current}, expected: {expected}")]
    InvalidState { current: String, expected: String },

    #[error("Amount mismatch: ledger has {expected}, provider reported {reported}")]
    AmountMismatch { expected: String, reported: String },

    #[error("Vote count must be positive")]
    InvalidVoteCount,
}

/// Payment provider errors (outbound calls and inbound webhooks)
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("{provider} rejected the request: {message}")]
    Rejected { provider: String, message: String },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Provider {0} is not configured")]
    NotConfigured(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Transaction(TransactionError::NotFound(reference)) => (
                StatusCode::NOT_FOUND,
                "TRANSACTION_NOT_FOUND",
                format!("Transaction not found: {}", reference),
                None,
            ),
            AppError::Transaction(TransactionError::DuplicateReference(reference)) => (
                StatusCode::CONFLICT,
                "DUPLICATE_REFERENCE",
                format!("A transaction already exists for reference: {}", reference),
                None,
            ),
            AppError::Transaction(TransactionError::InvalidState { current, expected }) => (
                StatusCode::CONFLICT,
                "INVALID_STATE",
                format!("Transaction in state {}, expected {}", current, expected),
                Some(serde_json::json!({
                    "current": current,
                    "expected": expected,
                })),
            ),
            AppError::Transaction(TransactionError::AmountMismatch { expected, reported }) => (
                StatusCode::BAD_REQUEST,
                "AMOUNT_MISMATCH",
                "Reported amount does not match the transaction".to_string(),
                Some(serde_json::json!({
                    "expected": expected,
                    "reported": reported,
                })),
            ),
            AppError::Transaction(TransactionError::InvalidVoteCount) => (
                StatusCode::BAD_REQUEST,
                "INVALID_VOTE_COUNT",
                "Vote count must be positive".to_string(),
                None,
            ),
            AppError::Provider(ProviderError::InvalidSignature) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_SIGNATURE",
                "Webhook signature verification failed".to_string(),
                None,
            ),
            AppError::Provider(ProviderError::MalformedPayload(msg)) => (
                StatusCode::BAD_REQUEST,
                "MALFORMED_PAYLOAD",
                format!("Malformed webhook payload: {}", msg),
                None,
            ),
            AppError::Provider(ProviderError::NotConfigured(provider)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PROVIDER_NOT_CONFIGURED",
                format!("Payment provider {} is not configured", provider),
                None,
            ),
            AppError::Provider(ProviderError::RequestFailed { provider, message })
            | AppError::Provider(ProviderError::Rejected { provider, message }) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                format!("{}: {}", provider, message),
                None,
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                msg,
                None,
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg,
                None,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
                None,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::InvalidInput(format!("Decimal conversion error: {:?}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {:?}", error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
