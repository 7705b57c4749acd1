//! Usage log models.
//!
//! One row per gated call, append-only. The rows serve two purposes: counting a key's calls
//! since midnight for the daily cap, and the usage views of the dashboard and admin surfaces.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column width of `api_call_logs.endpoint`.
const MAX_ENDPOINT_LEN: usize = 255;

/// Rows returned by the account owner's log view.
pub const ACCOUNT_LOG_LIMIT: i64 = 50;

/// Rows returned by the admin log view.
pub const ADMIN_LOG_LIMIT: i64 = 100;

/// Represents a usage log row.
///
/// # Database Table
///
/// Maps to the `api_call_logs` table. Rows are never updated or deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsageEntry {
    pub id: i64,
    pub api_key_id: Uuid,
    pub endpoint: String,
    pub method: String,
    pub ip_address: Option<String>,
    pub status_code: i32,
    /// Assigned by the store at write time
    pub logged_at: DateTime<Utc>,
}

/// A usage row about to be appended.
#[derive(Debug, Clone)]
pub struct NewUsageEntry {
    pub api_key_id: Uuid,
    pub endpoint: String,
    pub method: String,
    pub ip_address: Option<String>,
    pub status_code: i32,
}

impl NewUsageEntry {
    /// Build an entry, truncating the endpoint to the column width.
    pub fn new(
        api_key_id: Uuid,
        endpoint: &str,
        method: &str,
        ip_address: Option<String>,
        status_code: u16,
    ) -> Self {
        let endpoint = match endpoint.char_indices().nth(MAX_ENDPOINT_LEN) {
            Some((cut, _)) => &endpoint[..cut],
            None => endpoint,
        };
        Self {
            api_key_id,
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            ip_address,
            status_code: i32::from(status_code),
        }
    }
}

/// Start of the current UTC calendar day. The daily cap counts calls from here.
pub fn today_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Time window of a log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    LastHour,
    LastDay,
    #[default]
    LastWeek,
    LastMonth,
    All,
}

impl TimeRange {
    /// Parse the `time_range` query parameter. Unknown values mean the last week.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("1h") => TimeRange::LastHour,
            Some("24h") => TimeRange::LastDay,
            Some("30d") => TimeRange::LastMonth,
            Some("all") => TimeRange::All,
            _ => TimeRange::LastWeek,
        }
    }

    /// Lower bound of the window, `None` for no bound.
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let span = match self {
            TimeRange::LastHour => Duration::hours(1),
            TimeRange::LastDay => Duration::hours(24),
            TimeRange::LastWeek => Duration::days(7),
            TimeRange::LastMonth => Duration::days(30),
            TimeRange::All => return None,
        };
        Some(now - span)
    }
}

/// Query string of the log views.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub time_range: Option<String>,
}

/// Response item of the log views.
///
/// ```json
/// {
///   "endpoint": "/api/news/",
///   "method": "GET",
///   "status_code": 200,
///   "ip_address": "203.0.113.7",
///   "timestamp": "2025-01-15T10:30:00Z"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageEntryResponse {
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<UsageEntry> for UsageEntryResponse {
    fn from(entry: UsageEntry) -> Self {
        Self {
            endpoint: entry.endpoint,
            method: entry.method,
            status_code: entry.status_code,
            ip_address: entry.ip_address,
            timestamp: entry.logged_at,
        }
    }
}
