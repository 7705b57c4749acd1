//! Credit ledger - two-bucket balances with atomic deduction.
//!
//! This service handles:
//! - Lazy daily refill of the free bucket
//! - Atomic check-and-deduct under concurrent callers
//! - Top-ups of the purchased bucket
//!
//! # Atomicity Guarantees
//!
//! `deduct` locks the account's ledger row (`FOR UPDATE`) for the whole
//! read-check-write sequence. Two deductions for the same account serialize; the second
//! one sees the balance left by the first. The wait for the lock is bounded by a
//! transaction-local `lock_timeout`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    db::{DbPool, is_lock_timeout},
    error::AppError,
    models::credit::{CreditBalance, Deduction, MAX_PURCHASED_CREDITS, validate_top_up},
};

/// Per-account credit balances.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Fetch the balance, creating the ledger row if the account has none.
    async fn open(&self, account_id: Uuid) -> Result<CreditBalance, AppError>;

    /// Refill the free bucket if the last refill was before today. Idempotent within a day.
    ///
    /// # Errors
    ///
    /// - `LedgerMissing`: the account has no ledger row
    async fn reset_if_stale(&self, account_id: Uuid) -> Result<CreditBalance, AppError>;

    /// Take `cost` credits, free bucket first.
    ///
    /// Returns `Deduction::Insufficient` and leaves the row untouched when the balance
    /// cannot cover the cost.
    ///
    /// # Errors
    ///
    /// - `LedgerMissing`: the account has no ledger row
    /// - `LedgerBusy`: the row lock could not be acquired in time
    /// - `InvalidRequest`: `cost` is not positive
    async fn deduct(&self, account_id: Uuid, cost: i64) -> Result<Deduction, AppError>;

    /// Add `amount` purchased credits, creating the ledger row if needed.
    async fn top_up(&self, account_id: Uuid, amount: i64) -> Result<CreditBalance, AppError>;

    async fn has_sufficient(&self, account_id: Uuid, cost: i64) -> Result<bool, AppError> {
        Ok(self.reset_if_stale(account_id).await?.has_sufficient(cost))
    }

    async fn total_available(&self, account_id: Uuid) -> Result<i64, AppError> {
        Ok(self.reset_if_stale(account_id).await?.total_available())
    }
}

/// Ledger stored in the `credit_ledgers` table.
#[derive(Clone)]
pub struct PgCreditLedger {
    pool: DbPool,
    daily_allotment: i64,
    lock_timeout: Duration,
}

impl PgCreditLedger {
    pub fn new(pool: DbPool, daily_allotment: i64, lock_timeout: Duration) -> Self {
        Self {
            pool,
            daily_allotment,
            lock_timeout,
        }
    }
}

/// Calendar day used for refills. The service runs on UTC.
fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Map lock timeouts to the retryable error, everything else to a database error.
fn ledger_error(error: sqlx::Error) -> AppError {
    if is_lock_timeout(&error) {
        AppError::LedgerBusy
    } else {
        AppError::Database(error)
    }
}

const SELECT_BALANCE: &str = r#"
    SELECT account_id, daily_free_credits, purchased_credits, last_reset_date
    FROM credit_ledgers
    WHERE account_id = $1
"#;

const SELECT_BALANCE_FOR_UPDATE: &str = r#"
    SELECT account_id, daily_free_credits, purchased_credits, last_reset_date
    FROM credit_ledgers
    WHERE account_id = $1
    FOR UPDATE
"#;

#[async_trait]
impl CreditLedger for PgCreditLedger {
    async fn open(&self, account_id: Uuid) -> Result<CreditBalance, AppError> {
        sqlx::query(
            r#"
            INSERT INTO credit_ledgers (account_id, daily_free_credits, purchased_credits, last_reset_date)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(self.daily_allotment)
        .bind(today())
        .execute(&self.pool)
        .await?;

        self.reset_if_stale(account_id).await
    }

    async fn reset_if_stale(&self, account_id: Uuid) -> Result<CreditBalance, AppError> {
        let today = today();

        // Single statement: takes the row lock only when there is something to reset,
        // so it serializes with in-flight deductions
        sqlx::query(
            r#"
            UPDATE credit_ledgers
            SET daily_free_credits = $2,
                last_reset_date = $3
            WHERE account_id = $1 AND last_reset_date < $3
            "#,
        )
        .bind(account_id)
        .bind(self.daily_allotment)
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(ledger_error)?;

        sqlx::query_as::<_, CreditBalance>(SELECT_BALANCE)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::LedgerMissing)
    }

    async fn deduct(&self, account_id: Uuid, cost: i64) -> Result<Deduction, AppError> {
        if cost <= 0 {
            return Err(AppError::InvalidRequest(
                "Cost must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Bound the row-lock wait for this transaction only
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        // Lock the ledger row; concurrent deductions for this account queue here
        let mut balance = sqlx::query_as::<_, CreditBalance>(SELECT_BALANCE_FOR_UPDATE)
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(ledger_error)?
            .ok_or(AppError::LedgerMissing)?;

        balance.reset_if_stale(today(), self.daily_allotment);

        if balance.try_deduct(cost).is_err() {
            tx.rollback().await?;
            return Ok(Deduction::Insufficient);
        }

        sqlx::query(
            r#"
            UPDATE credit_ledgers
            SET daily_free_credits = $2,
                purchased_credits = $3,
                last_reset_date = $4
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .bind(balance.daily_free_credits)
        .bind(balance.purchased_credits)
        .bind(balance.last_reset_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Deduction::Applied(balance))
    }

    async fn top_up(&self, account_id: Uuid, amount: i64) -> Result<CreditBalance, AppError> {
        validate_top_up(amount).map_err(AppError::InvalidRequest)?;

        // The ceiling guard leaves the row untouched when the sum would cross it
        let result = sqlx::query(
            r#"
            INSERT INTO credit_ledgers (account_id, daily_free_credits, purchased_credits, last_reset_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_id)
            DO UPDATE SET purchased_credits = credit_ledgers.purchased_credits + EXCLUDED.purchased_credits
            WHERE credit_ledgers.purchased_credits + EXCLUDED.purchased_credits <= $5
            "#,
        )
        .bind(account_id)
        .bind(self.daily_allotment)
        .bind(amount)
        .bind(today())
        .bind(MAX_PURCHASED_CREDITS)
        .execute(&self.pool)
        .await
        .map_err(ledger_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidRequest(format!(
                "Purchased credits cannot exceed {MAX_PURCHASED_CREDITS}."
            )));
        }

        tracing::info!(%account_id, amount, "purchased credits added");

        self.reset_if_stale(account_id).await
    }
}
