//! Admin HTTP handlers (staff only).
//!
//! - POST /api/accounts/admin/users/{id}/add_credits/ - Top up purchased credits
//! - POST /api/accounts/admin/users/{id}/toggle_active/ - Ban or unban an account
//! - GET /api/accounts/admin/users/{id}/logs/ - Usage of an account
//! - POST /api/accounts/admin/users/{id}/keys/ - Issue a key on an account's behalf

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{Account, AccountStatusResponse},
        api_key::{ApiKeyResponse, CreateApiKeyRequest},
        credit::{AddCreditsRequest, AddCreditsResponse},
        usage::{ADMIN_LOG_LIMIT, LogQuery, TimeRange, UsageEntryResponse},
    },
    state::AppState,
};

async fn existing_account(state: &AppState, account_id: Uuid) -> Result<Account, AppError> {
    state
        .accounts
        .find(account_id)
        .await?
        .ok_or(AppError::NotFound("Account"))
}

/// Add purchased credits to an account.
///
/// # Request Body
///
/// ```json
/// { "credits": 500 }
/// ```
///
/// # Response (200)
///
/// ```json
/// { "status": "credits added", "total_credits": 520 }
/// ```
pub async fn add_credits(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    payload: Result<Json<AddCreditsRequest>, JsonRejection>,
) -> Result<Json<AddCreditsResponse>, AppError> {
    let Json(request) = payload?;
    existing_account(&state, account_id).await?;

    let balance = state.ledger.top_up(account_id, request.credits).await?;

    Ok(Json(AddCreditsResponse {
        status: "credits added",
        total_credits: balance.total_available(),
    }))
}

/// Flip an account's active flag. Keys of an inactive account stop working immediately.
pub async fn toggle_active(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountStatusResponse>, AppError> {
    let account = state.accounts.toggle_active(account_id).await?;
    Ok(Json(account.into()))
}

/// Usage of one account.
///
/// # Query Parameters
///
/// - `time_range` - `1h`, `24h`, `7d` (default), `30d` or `all`
pub async fn logs(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<UsageEntryResponse>>, AppError> {
    existing_account(&state, account_id).await?;

    let since = TimeRange::parse(query.time_range.as_deref()).since(Utc::now());
    let entries = state
        .usage
        .query_for_account(account_id, since, ADMIN_LOG_LIMIT)
        .await?;

    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Issue a key for an account. Same contract as the dashboard's `create_key`.
pub async fn issue_key(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    payload: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    existing_account(&state, account_id).await?;

    let issued = state.registry.issue(account_id, &request).await?;
    Ok((StatusCode::CREATED, Json(ApiKeyResponse::from(issued))))
}
