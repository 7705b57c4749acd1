//! Gateway liveness endpoint.
//!
//! `/health` lives outside the metered prefix: it needs no API key, is never charged
//! and never reaches the usage log. Only the Postgres store is probed. The WordPress
//! source is connected lazily and its outages surface as 503 on the news routes instead.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,

    /// Accounts, ledgers, keys and usage logs
    pub ledger_store: &'static str,

    /// Path prefix the admission gateway meters
    pub metered_prefix: String,

    pub timestamp: DateTime<Utc>,
}

/// `{"status":"healthy","ledger_store":"connected","metered_prefix":"/api/news",...}`
///
/// An unreachable ledger store is reported as the standard 500 error body.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.accounts.ping().await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        ledger_store: "connected",
        metered_prefix: state.settings.metered_prefix.clone(),
        timestamp: Utc::now(),
    }))
}
