//! Account data model.
//!
//! An account is a tenant of the platform. Registration and activation live outside this
//! service; here an account is only read (for liveness and staff checks) and toggled by admins.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Owns exactly one credit ledger row (created by trigger on insert)
/// - Owns zero or more API keys
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Login email, unique across accounts
    pub email: String,

    /// Deactivated accounts are rejected by the gateway and the dashboard.
    pub is_active: bool,

    /// Staff accounts may use the admin endpoints.
    pub is_staff: bool,

    /// Timestamp when account was created
    pub created_at: DateTime<Utc>,
}

/// Response body of the admin toggle endpoint.
#[derive(Debug, Serialize)]
pub struct AccountStatusResponse {
    pub status: &'static str,
    pub is_active: bool,
}

impl From<Account> for AccountStatusResponse {
    fn from(account: Account) -> Self {
        Self {
            status: "user status updated",
            is_active: account.is_active,
        }
    }
}
