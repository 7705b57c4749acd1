//! Admission gateway for the metered partner API.
//!
//! Every request under the metered prefix runs through one pipeline:
//! 1. Extract the API key from the `X-API-KEY` header (401 if missing)
//! 2. Resolve it to an active key (403 if unknown or revoked)
//! 3. Check the owning account is active (403)
//! 4. Check the key's calls since UTC midnight against its daily cap (429)
//! 5. Deduct one credit from the account's ledger (402 if it cannot be covered)
//! 6. Run the protected handler with an [`ApiKeyContext`] attached
//! 7. Log the admitted call with the handler's status
//!
//! The credit is paid before the handler runs, so retries of slow or failing calls are
//! still metered. Calls rejected in steps 1-5 are never logged and never count toward the cap. Usage log failures are reported through tracing and never reach the client.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        api_key::ResolvedKey,
        credit::Deduction,
        usage::{NewUsageEntry, today_start},
    },
    state::AppState,
};

/// Header carrying the partner's API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Credits charged per admitted call.
pub const CALL_COST: i64 = 1;

/// Context attached to admitted requests.
///
/// Protected handlers can extract it with `Extension<ApiKeyContext>`.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub key_id: Uuid,
    pub account_id: Uuid,
    pub label: String,
    pub daily_limit: i64,
}

/// Gateway middleware. Mount it with `from_fn_with_state` over the metered routes.
pub async fn admission_gateway(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    // Step 1: Anything outside the metered prefix passes through untouched
    if !is_metered(&path, &state.settings.metered_prefix) {
        return next.run(request).await;
    }

    // Step 2: Extract key
    let Some(secret) = extract_api_key(request.headers()) else {
        return AppError::MissingApiKey.into_response();
    };

    // Step 3: Resolve key (unknown and revoked keys fail the same way)
    let resolved = match state.registry.resolve(&secret).await {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };

    // Steps 4-6: Liveness, daily cap, payment. Rejections here are not logged:
    // only paid calls count toward the cap
    if let Err(e) = admit(&state, &resolved).await {
        tracing::info!(
            key_id = %resolved.key.id,
            account_id = %resolved.key.account_id,
            reason = %e,
            "request rejected by admission gateway"
        );
        return e.into_response();
    }

    let method = request.method().to_string();
    let ip_address = client_ip(&request);

    request.extensions_mut().insert(ApiKeyContext {
        key_id: resolved.key.id,
        account_id: resolved.key.account_id,
        label: resolved.key.label.clone(),
        daily_limit: resolved.key.daily_cap(),
    });
    let response = next.run(request).await;

    // Step 7: Log the admitted call, whatever the handler returned
    let entry = NewUsageEntry::new(
        resolved.key.id,
        &path,
        &method,
        ip_address,
        response.status().as_u16(),
    );
    if let Err(e) = state.usage.record(entry).await {
        tracing::error!(
            key_id = %resolved.key.id,
            endpoint = %path,
            error = %e,
            "failed to write usage log entry"
        );
    }

    response
}

/// Admission decision for a resolved key. Deducts the call cost on success.
async fn admit(state: &AppState, resolved: &ResolvedKey) -> Result<(), AppError> {
    let key = &resolved.key;

    if !resolved.account_active {
        return Err(AppError::InactiveAccount);
    }

    // Cap before credits: a capped key must not drain the account
    let calls_today = state.usage.count_since(key.id, today_start(Utc::now())).await?;
    if calls_today >= key.daily_cap() {
        return Err(AppError::DailyLimitExceeded {
            limit: key.daily_cap(),
        });
    }

    let deduction = tokio::time::timeout(
        state.settings.ledger_timeout,
        state.ledger.deduct(key.account_id, CALL_COST),
    )
    .await
    .map_err(|_| AppError::LedgerBusy)??;

    match deduction {
        Deduction::Applied(balance) => {
            tracing::debug!(
                account_id = %key.account_id,
                remaining = balance.total_available(),
                "credit deducted"
            );
            Ok(())
        }
        Deduction::Insufficient => Err(AppError::InsufficientCredits),
    }
}

/// Whether `path` is the prefix itself or lies below it.
pub fn is_metered(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(String::from)
}

/// First `X-Forwarded-For` hop, else the peer address when the server exposes it.
fn client_ip(request: &Request) -> Option<String> {
    let forwarded = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}
