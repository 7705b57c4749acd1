//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Authentication Errors**: missing, unknown or revoked API keys, inactive accounts,
///   invalid dashboard tokens
/// - **Rate Limit Errors**: per-key daily call cap reached
/// - **Payment Errors**: not enough credits left in either bucket
/// - **Configuration Errors**: an account without a credit ledger
/// - **Storage Errors**: database failures, ledger lock timeouts, content source outages
/// - **Request Errors**: missing resources, ownership violations, invalid input
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No `X-API-KEY` header on a metered request.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Missing X-API-KEY header")]
    MissingApiKey,

    /// API key is unknown or revoked. Both cases share this variant so a caller
    /// cannot tell them apart.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Invalid or inactive API Key")]
    InvalidApiKey,

    /// The key is valid but its owning account has been deactivated.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("User account is inactive")]
    InactiveAccount,

    /// The key reached its daily call cap.
    ///
    /// Returns HTTP 429 Too Many Requests.
    #[error("Daily limit of {limit} calls reached for this API key")]
    DailyLimitExceeded { limit: i64 },

    /// Neither the free nor the purchased bucket can cover the call.
    ///
    /// Returns HTTP 402 Payment Required.
    #[error("Insufficient credits. Daily limit reached or balance empty.")]
    InsufficientCredits,

    /// The account has no credit ledger. Accounts always get one on creation,
    /// so this is an operational defect.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("User has no credit account configured")]
    LedgerMissing,

    /// The ledger row could not be locked in time.
    ///
    /// Returns HTTP 503 Service Unavailable; the client may retry.
    #[error("Credit ledger is busy, retry later")]
    LedgerBusy,

    /// The news content source failed.
    ///
    /// Returns HTTP 503 Service Unavailable without the underlying detail.
    #[error("Content source error: {0}")]
    ContentSource(sqlx::Error),

    /// Requested resource does not exist (or is not visible to the caller).
    ///
    /// Returns HTTP 404 Not Found. The string names the resource.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The resource exists but belongs to another account.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Resource belongs to another account")]
    Forbidden,

    /// Dashboard access token missing, malformed, expired, or its account is unusable.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    /// Caller is authenticated but not staff.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Staff privileges required")]
    AdminRequired,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

impl AppError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingApiKey | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidApiKey
            | AppError::InactiveAccount
            | AppError::Forbidden
            | AppError::AdminRequired => StatusCode::FORBIDDEN,
            AppError::DailyLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::LedgerBusy | AppError::ContentSource(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::LedgerMissing | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::MissingApiKey => "missing_api_key",
            AppError::InvalidApiKey => "invalid_api_key",
            AppError::InactiveAccount => "inactive_account",
            AppError::DailyLimitExceeded { .. } => "daily_limit_exceeded",
            AppError::InsufficientCredits => "insufficient_credits",
            AppError::LedgerMissing => "ledger_missing",
            AppError::LedgerBusy => "ledger_busy",
            AppError::ContentSource(_) => "content_unavailable",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden => "forbidden",
            AppError::Unauthorized => "unauthorized",
            AppError::AdminRequired => "admin_required",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Database(_) => "internal_error",
        }
    }
}

/// Malformed or mistyped JSON bodies are reported in the standard error shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Server-side failures are logged here and reported to the client with a generic
/// message, so query details never leak.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "An internal error occurred".to_string()
            }
            AppError::ContentSource(e) => {
                tracing::error!(error = %e, "news content source error");
                "News content is temporarily unavailable".to_string()
            }
            AppError::LedgerMissing => {
                tracing::error!("account resolved without a credit ledger");
                self.to_string()
            }
            AppError::InvalidRequest(msg) => msg.clone(),
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
