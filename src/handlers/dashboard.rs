//! Account dashboard HTTP handlers.
//!
//! These endpoints let an account owner manage their own keys and look at their
//! balance and usage:
//! - GET /api/dashboard/credits/ - Current balance
//! - GET /api/dashboard/list_keys/ - Keys of the caller
//! - POST /api/dashboard/create_key/ - Issue a key
//! - POST /api/dashboard/{id}/revoke_key/ - Revoke a key
//! - GET /api/dashboard/logs/ - Recent usage

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::session::SessionContext,
    models::{
        api_key::{ApiKeyResponse, CreateApiKeyRequest},
        credit::CreditSummary,
        usage::{ACCOUNT_LOG_LIMIT, LogQuery, TimeRange, UsageEntryResponse},
    },
    state::AppState,
};

/// Current credit balance of the caller.
///
/// The ledger row is created if missing and refilled if stale before it is shown.
///
/// ```json
/// { "daily_free_credits": 20, "purchased_credits": 0, "remaining_credits": 20 }
/// ```
pub async fn credits(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<CreditSummary>, AppError> {
    let balance = state.ledger.open(session.account.id).await?;
    Ok(Json(balance.into()))
}

/// List the caller's keys, newest first. Secrets are never included.
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = state.registry.list_for_account(session.account.id).await?;
    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// Issue a new key.
///
/// # Response (201 Created)
///
/// The `key` field holds the secret. It is not shown again.
pub async fn create_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let issued = state.registry.issue(session.account.id, &request).await?;
    Ok((StatusCode::CREATED, Json(ApiKeyResponse::from(issued))))
}

/// Revoke one of the caller's keys.
///
/// # Response
///
/// - **Success (200 OK)**: `{"status": "Key revoked"}`
/// - **Error (404)**: unknown key
/// - **Error (403)**: key belongs to another account
pub async fn revoke_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(key_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.registry.revoke(key_id, session.account.id).await?;
    Ok(Json(json!({ "status": "Key revoked" })))
}

/// Recent usage across all of the caller's keys.
pub async fn logs(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<UsageEntryResponse>>, AppError> {
    // No time window unless asked for; the row cap bounds the response
    let since = query
        .time_range
        .as_deref()
        .and_then(|range| TimeRange::parse(Some(range)).since(Utc::now()));

    let entries = state
        .usage
        .query_for_account(session.account.id, since, ACCOUNT_LOG_LIMIT)
        .await?;

    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
