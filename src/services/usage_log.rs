//! Usage log - append-only record of gated calls.
//!
//! Inserts are independent of each other and take no cross-row locks. `count_since`
//! may miss calls that are still being written; the daily cap is a soft limit and the
//! credit deduction is the hard one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::usage::{NewUsageEntry, UsageEntry},
};

#[async_trait]
pub trait UsageLog: Send + Sync {
    /// Append an entry; the store assigns the timestamp.
    async fn record(&self, entry: NewUsageEntry) -> Result<(), AppError>;

    /// Number of entries for `key_id` logged at or after `since`.
    async fn count_since(&self, key_id: Uuid, since: DateTime<Utc>) -> Result<i64, AppError>;

    /// Entries of all keys of an account, most recent first, at most `limit` rows.
    async fn query_for_account(
        &self,
        account_id: Uuid,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<UsageEntry>, AppError>;
}

/// Log stored in the `api_call_logs` table.
#[derive(Clone)]
pub struct PgUsageLog {
    pool: DbPool,
}

impl PgUsageLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageLog for PgUsageLog {
    async fn record(&self, entry: NewUsageEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO api_call_logs (api_key_id, endpoint, method, ip_address, status_code)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.api_key_id)
        .bind(entry.endpoint)
        .bind(entry.method)
        .bind(entry.ip_address)
        .bind(entry.status_code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_since(&self, key_id: Uuid, since: DateTime<Utc>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM api_call_logs WHERE api_key_id = $1 AND logged_at >= $2",
        )
        .bind(key_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn query_for_account(
        &self,
        account_id: Uuid,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<UsageEntry>, AppError> {
        let entries = sqlx::query_as::<_, UsageEntry>(
            r#"
            SELECT l.id, l.api_key_id, l.endpoint, l.method, l.ip_address, l.status_code, l.logged_at
            FROM api_call_logs l
            JOIN api_keys k ON k.id = l.api_key_id
            WHERE k.account_id = $1
              AND ($2::timestamptz IS NULL OR l.logged_at >= $2)
            ORDER BY l.logged_at DESC
            LIMIT $3
            "#,
        )
        .bind(account_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
