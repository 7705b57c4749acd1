//! Two-bucket credit balance.
//!
//! Every account holds a daily free bucket, refilled lazily on the first access of a new
//! calendar day, and a purchased bucket that only shrinks through usage and only grows
//! through top-ups. The arithmetic lives here so every ledger backend applies the same rules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ceiling of the purchased bucket. Top-ups that would cross it are refused.
pub const MAX_PURCHASED_CREDITS: i64 = 1_000_000_000_000;

/// Snapshot of one account's ledger row.
///
/// # Database Table
///
/// Maps to the `credit_ledgers` table. Both buckets are `CHECK (>= 0)` in the schema as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct CreditBalance {
    pub account_id: Uuid,

    /// Credits granted for the current day. Consumed before purchased credits.
    pub daily_free_credits: i64,

    /// Durable credits acquired through top-ups.
    pub purchased_credits: i64,

    /// Calendar day of the last daily refill.
    pub last_reset_date: NaiveDate,
}

/// Returned when a deduction cannot be covered. The balance is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient credits: {available} available, {cost} required")]
pub struct InsufficientCredits {
    pub available: i64,
    pub cost: i64,
}

impl CreditBalance {
    /// A fresh ledger as created for a new account.
    pub fn new(account_id: Uuid, daily_allotment: i64, today: NaiveDate) -> Self {
        Self {
            account_id,
            daily_free_credits: daily_allotment,
            purchased_credits: 0,
            last_reset_date: today,
        }
    }

    pub fn total_available(&self) -> i64 {
        self.daily_free_credits.saturating_add(self.purchased_credits)
    }

    /// Add purchased credits, refusing non-positive amounts and totals above
    /// [`MAX_PURCHASED_CREDITS`].
    pub fn try_top_up(&mut self, amount: i64) -> Result<(), String> {
        validate_top_up(amount)?;
        self.purchased_credits = self
            .purchased_credits
            .checked_add(amount)
            .filter(|total| *total <= MAX_PURCHASED_CREDITS)
            .ok_or_else(|| {
                format!("Purchased credits cannot exceed {MAX_PURCHASED_CREDITS}.")
            })?;
        Ok(())
    }

    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_reset_date < today
    }

    /// Refill the free bucket if the last refill happened on an earlier day.
    ///
    /// Returns whether anything changed, so callers persist only when needed.
    pub fn reset_if_stale(&mut self, today: NaiveDate, daily_allotment: i64) -> bool {
        if !self.is_stale(today) {
            return false;
        }
        self.daily_free_credits = daily_allotment;
        self.last_reset_date = today;
        true
    }

    pub fn has_sufficient(&self, cost: i64) -> bool {
        self.total_available() >= cost
    }

    /// Take `cost` credits, free bucket first, shortfall from the purchased bucket.
    pub fn try_deduct(&mut self, cost: i64) -> Result<(), InsufficientCredits> {
        if !self.has_sufficient(cost) {
            return Err(InsufficientCredits {
                available: self.total_available(),
                cost,
            });
        }

        let from_free = cost.min(self.daily_free_credits);
        self.daily_free_credits -= from_free;
        self.purchased_credits -= cost - from_free;
        Ok(())
    }
}

/// Check a top-up amount on its own, before the current balance is known.
pub fn validate_top_up(amount: i64) -> Result<(), String> {
    if amount <= 0 {
        return Err("Credit amount must be positive.".to_string());
    }
    if amount > MAX_PURCHASED_CREDITS {
        return Err(format!("Purchased credits cannot exceed {MAX_PURCHASED_CREDITS}."));
    }
    Ok(())
}

/// Result of a ledger deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deduction {
    /// Credits were taken; carries the balance after the deduction.
    Applied(CreditBalance),
    /// The balance could not cover the cost and was left unmodified.
    Insufficient,
}

impl Deduction {
    pub fn is_applied(&self) -> bool {
        matches!(self, Deduction::Applied(_))
    }
}

/// Balance as shown on the dashboard.
///
/// ```json
/// { "daily_free_credits": 12, "purchased_credits": 300, "remaining_credits": 312 }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct CreditSummary {
    pub daily_free_credits: i64,
    pub purchased_credits: i64,
    pub remaining_credits: i64,
}

impl From<CreditBalance> for CreditSummary {
    fn from(balance: CreditBalance) -> Self {
        Self {
            daily_free_credits: balance.daily_free_credits,
            purchased_credits: balance.purchased_credits,
            remaining_credits: balance.total_available(),
        }
    }
}

/// Admin request to add purchased credits.
#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    pub credits: i64,
}

/// Admin response after a top-up.
#[derive(Debug, Serialize)]
pub struct AddCreditsResponse {
    pub status: &'static str,
    pub total_credits: i64,
}
