//! In-memory implementations of the collaborator traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::Account,
        api_key::{ApiKey, CreateApiKeyRequest, IssuedKey, NewApiKey, ResolvedKey, hash_secret},
        credit::{CreditBalance, Deduction},
        news::{ContentPage, NewsPost},
        usage::{NewUsageEntry, UsageEntry},
    },
    services::{
        accounts::AccountDirectory, content::ContentRepository, credit_ledger::CreditLedger,
        key_registry::KeyRegistry, usage_log::UsageLog,
    },
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, is_staff: bool) -> Uuid {
        let account = Account {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4().simple()),
            is_active: true,
            is_staff,
            created_at: Utc::now(),
        };
        let id = account.id;
        self.accounts.lock().unwrap().insert(id, account);
        id
    }

    pub fn set_active(&self, account_id: Uuid, active: bool) {
        if let Some(account) = self.accounts.lock().unwrap().get_mut(&account_id) {
            account.is_active = active;
        }
    }

    /// Accounts never registered here count as active.
    pub fn is_active(&self, account_id: Uuid) -> bool {
        self.accounts
            .lock()
            .unwrap()
            .get(&account_id)
            .is_none_or(|a| a.is_active)
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccounts {
    async fn find(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.lock().unwrap().get(&account_id).cloned())
    }

    async fn toggle_active(&self, account_id: Uuid) -> Result<Account, AppError> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&account_id)
            .ok_or(AppError::NotFound("Account"))?;
        account.is_active = !account.is_active;
        Ok(account.clone())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

// ============================================================================
// Credit ledger
// ============================================================================

/// Ledger whose rows live in one mutex. The lock is held for the whole
/// read-check-write of a deduction, like the row lock of the Postgres ledger.
pub struct InMemoryLedger {
    daily_allotment: i64,
    balances: Mutex<HashMap<Uuid, CreditBalance>>,
}

impl InMemoryLedger {
    pub fn new(daily_allotment: i64) -> Self {
        Self {
            daily_allotment,
            balances: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, account_id: Uuid, free: i64, purchased: i64) {
        self.seed_at(account_id, free, purchased, today());
    }

    /// Seed a row last refilled yesterday.
    pub fn seed_stale(&self, account_id: Uuid, free: i64, purchased: i64) {
        self.seed_at(account_id, free, purchased, today() - Duration::days(1));
    }

    fn seed_at(&self, account_id: Uuid, free: i64, purchased: i64, last_reset_date: NaiveDate) {
        self.balances.lock().unwrap().insert(
            account_id,
            CreditBalance {
                account_id,
                daily_free_credits: free,
                purchased_credits: purchased,
                last_reset_date,
            },
        );
    }

    pub fn balance(&self, account_id: Uuid) -> Option<CreditBalance> {
        self.balances.lock().unwrap().get(&account_id).copied()
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn open(&self, account_id: Uuid) -> Result<CreditBalance, AppError> {
        self.balances
            .lock()
            .unwrap()
            .entry(account_id)
            .or_insert_with(|| CreditBalance::new(account_id, self.daily_allotment, today()));
        self.reset_if_stale(account_id).await
    }

    async fn reset_if_stale(&self, account_id: Uuid) -> Result<CreditBalance, AppError> {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances
            .get_mut(&account_id)
            .ok_or(AppError::LedgerMissing)?;
        balance.reset_if_stale(today(), self.daily_allotment);
        Ok(*balance)
    }

    async fn deduct(&self, account_id: Uuid, cost: i64) -> Result<Deduction, AppError> {
        if cost <= 0 {
            return Err(AppError::InvalidRequest("Cost must be positive".to_string()));
        }
        tokio::task::yield_now().await;

        let mut balances = self.balances.lock().unwrap();
        let row = balances
            .get_mut(&account_id)
            .ok_or(AppError::LedgerMissing)?;

        let mut balance = *row;
        balance.reset_if_stale(today(), self.daily_allotment);
        if balance.try_deduct(cost).is_err() {
            return Ok(Deduction::Insufficient);
        }
        *row = balance;
        Ok(Deduction::Applied(balance))
    }

    async fn top_up(&self, account_id: Uuid, amount: i64) -> Result<CreditBalance, AppError> {
        {
            let mut balances = self.balances.lock().unwrap();
            let mut balance = balances
                .get(&account_id)
                .copied()
                .unwrap_or_else(|| CreditBalance::new(account_id, self.daily_allotment, today()));
            balance.try_top_up(amount).map_err(AppError::InvalidRequest)?;
            balances.insert(account_id, balance);
        }
        self.reset_if_stale(account_id).await
    }
}

// ============================================================================
// Key registry
// ============================================================================

pub struct InMemoryKeyRegistry {
    default_daily_limit: i32,
    accounts: Arc<InMemoryAccounts>,
    keys: Mutex<Vec<ApiKey>>,
}

impl InMemoryKeyRegistry {
    pub fn new(default_daily_limit: i32) -> Self {
        Self::with_accounts(default_daily_limit, Arc::new(InMemoryAccounts::new()))
    }

    pub fn with_accounts(default_daily_limit: i32, accounts: Arc<InMemoryAccounts>) -> Self {
        Self {
            default_daily_limit,
            accounts,
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn owner_of(&self, key_id: Uuid) -> Option<Uuid> {
        self.keys
            .lock()
            .unwrap()
            .iter()
            .find(|k| k.id == key_id)
            .map(|k| k.account_id)
    }
}

#[async_trait]
impl KeyRegistry for InMemoryKeyRegistry {
    async fn issue(
        &self,
        account_id: Uuid,
        request: &CreateApiKeyRequest,
    ) -> Result<IssuedKey, AppError> {
        let (new_key, secret) = NewApiKey::prepare(account_id, request, self.default_daily_limit)
            .map_err(AppError::InvalidRequest)?;

        let key = ApiKey {
            id: Uuid::new_v4(),
            account_id: new_key.account_id,
            label: new_key.label,
            key_prefix: new_key.key_prefix,
            key_hash: new_key.key_hash,
            is_active: true,
            daily_limit: new_key.daily_limit,
            created_at: Utc::now(),
        };
        self.keys.lock().unwrap().push(key.clone());
        Ok(IssuedKey { key, secret })
    }

    async fn resolve(&self, secret: &str) -> Result<ResolvedKey, AppError> {
        let hash = hash_secret(secret);
        let key = self
            .keys
            .lock()
            .unwrap()
            .iter()
            .find(|k| k.key_hash == hash && k.is_active)
            .cloned()
            .ok_or(AppError::InvalidApiKey)?;

        Ok(ResolvedKey {
            account_active: self.accounts.is_active(key.account_id),
            key,
        })
    }

    async fn revoke(&self, key_id: Uuid, account_id: Uuid) -> Result<ApiKey, AppError> {
        let mut keys = self.keys.lock().unwrap();
        let key = keys
            .iter_mut()
            .find(|k| k.id == key_id)
            .ok_or(AppError::NotFound("API key"))?;
        if key.account_id != account_id {
            return Err(AppError::Forbidden);
        }
        key.is_active = false;
        Ok(key.clone())
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        Ok(self
            .keys
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|k| k.account_id == account_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Usage log
// ============================================================================

pub struct InMemoryUsageLog {
    registry: Arc<InMemoryKeyRegistry>,
    entries: Mutex<Vec<UsageEntry>>,
    next_id: AtomicI64,
    fail_writes: AtomicBool,
}

impl InMemoryUsageLog {
    pub fn new(registry: Arc<InMemoryKeyRegistry>) -> Self {
        Self {
            registry,
            entries: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Vec<UsageEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Pretend `count` successful calls were made today.
    pub fn backfill(&self, key_id: Uuid, count: usize) {
        self.backfill_at(key_id, count, Utc::now());
    }

    /// Pretend `count` calls were made shortly before today's midnight.
    pub fn backfill_yesterday(&self, key_id: Uuid, count: usize) {
        let midnight = crate::models::usage::today_start(Utc::now());
        self.backfill_at(key_id, count, midnight - Duration::minutes(5));
    }

    pub fn backfill_days_ago(&self, key_id: Uuid, days: i64, count: usize) {
        self.backfill_at(key_id, count, Utc::now() - Duration::days(days));
    }

    fn backfill_at(&self, key_id: Uuid, count: usize, at: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap();
        for _ in 0..count {
            entries.push(UsageEntry {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                api_key_id: key_id,
                endpoint: "/api/news/".to_string(),
                method: "GET".to_string(),
                ip_address: None,
                status_code: 200,
                logged_at: at,
            });
        }
    }
}

#[async_trait]
impl UsageLog for InMemoryUsageLog {
    async fn record(&self, entry: NewUsageEntry) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        self.entries.lock().unwrap().push(UsageEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            api_key_id: entry.api_key_id,
            endpoint: entry.endpoint,
            method: entry.method,
            ip_address: entry.ip_address,
            status_code: entry.status_code,
            logged_at: Utc::now(),
        });
        Ok(())
    }

    async fn count_since(&self, key_id: Uuid, since: DateTime<Utc>) -> Result<i64, AppError> {
        let count = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.api_key_id == key_id && e.logged_at >= since)
            .count();
        Ok(count as i64)
    }

    async fn query_for_account(
        &self,
        account_id: Uuid,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<UsageEntry>, AppError> {
        let mut entries: Vec<UsageEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| self.registry.owner_of(e.api_key_id) == Some(account_id))
            .filter(|e| since.is_none_or(|since| e.logged_at >= since))
            .cloned()
            .collect();

        entries.sort_by(|a, b| b.logged_at.cmp(&a.logged_at).then(b.id.cmp(&a.id)));
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(entries)
    }
}

// ============================================================================
// Content
// ============================================================================

#[derive(Default)]
pub struct InMemoryContent {
    posts: Mutex<Vec<(NewsPost, Vec<u64>)>>,
    fail: AtomicBool,
}

impl InMemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, post: NewsPost) {
        self.posts.lock().unwrap().push((post, Vec::new()));
    }

    pub fn insert_in_category(&self, post: NewsPost, category_id: u64) {
        self.posts.lock().unwrap().push((post, vec![category_id]));
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::ContentSource(sqlx::Error::Protocol(
                "SELECT ... FROM wp_posts failed".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for InMemoryContent {
    async fn list(
        &self,
        category_ids: Option<&[u64]>,
        limit: i64,
        offset: i64,
    ) -> Result<ContentPage, AppError> {
        self.check()?;

        let mut matching: Vec<NewsPost> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, cats)| category_ids.is_none_or(|ids| cats.iter().any(|c| ids.contains(c))))
            .map(|(post, _)| post.clone())
            .collect();
        matching.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect();

        Ok(ContentPage { items, total })
    }

    async fn get(&self, post_id: u64) -> Result<Option<NewsPost>, AppError> {
        self.check()?;
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|(post, _)| post.id == post_id)
            .map(|(post, _)| post.clone()))
    }
}
