//! Account directory - the slice of account management this service needs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::account::Account};

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find(&self, account_id: Uuid) -> Result<Option<Account>, AppError>;

    /// Flip the active flag (ban / unban).
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such account
    async fn toggle_active(&self, account_id: Uuid) -> Result<Account, AppError>;

    /// Verify the store is reachable.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Directory backed by the `accounts` table.
#[derive(Clone)]
pub struct PgAccountDirectory {
    pool: DbPool,
}

impl PgAccountDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn find(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, is_active, is_staff, created_at FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn toggle_active(&self, account_id: Uuid) -> Result<Account, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET is_active = NOT is_active
            WHERE id = $1
            RETURNING id, email, is_active, is_staff, created_at
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Account"))?;

        tracing::info!(%account_id, is_active = account.is_active, "account status changed");

        Ok(account)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
