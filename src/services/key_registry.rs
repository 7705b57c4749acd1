//! API key registry - issuing, resolving and revoking partner keys.
//!
//! Secrets are hashed with SHA-256 before they touch the database. A secret is only
//! ever returned by `issue`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::api_key::{ApiKey, CreateApiKeyRequest, IssuedKey, NewApiKey, ResolvedKey, hash_secret},
};

/// Lifecycle of partner API keys.
#[async_trait]
pub trait KeyRegistry: Send + Sync {
    /// Create a key for an account. The returned `IssuedKey` holds the only copy of the secret.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: label too long or non-positive daily limit
    async fn issue(
        &self,
        account_id: Uuid,
        request: &CreateApiKeyRequest,
    ) -> Result<IssuedKey, AppError>;

    /// Look up an active key by its secret.
    ///
    /// # Errors
    ///
    /// - `InvalidApiKey`: unknown or revoked, deliberately indistinguishable
    async fn resolve(&self, secret: &str) -> Result<ResolvedKey, AppError>;

    /// Deactivate a key owned by `account_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no key with this id
    /// - `Forbidden`: the key belongs to another account
    async fn revoke(&self, key_id: Uuid, account_id: Uuid) -> Result<ApiKey, AppError>;

    /// All keys of an account, newest first, revoked ones included.
    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<ApiKey>, AppError>;
}

/// Registry stored in the `api_keys` table.
#[derive(Clone)]
pub struct PgKeyRegistry {
    pool: DbPool,
    default_daily_limit: i32,
}

impl PgKeyRegistry {
    pub fn new(pool: DbPool, default_daily_limit: i32) -> Self {
        Self {
            pool,
            default_daily_limit,
        }
    }
}

#[async_trait]
impl KeyRegistry for PgKeyRegistry {
    async fn issue(
        &self,
        account_id: Uuid,
        request: &CreateApiKeyRequest,
    ) -> Result<IssuedKey, AppError> {
        let (new_key, secret) = NewApiKey::prepare(account_id, request, self.default_daily_limit)
            .map_err(AppError::InvalidRequest)?;

        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (account_id, label, key_prefix, key_hash, daily_limit)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, account_id, label, key_prefix, key_hash, is_active, daily_limit, created_at
            "#,
        )
        .bind(new_key.account_id)
        .bind(&new_key.label)
        .bind(&new_key.key_prefix)
        .bind(&new_key.key_hash)
        .bind(new_key.daily_limit)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(key_id = %key.id, %account_id, "api key issued");

        Ok(IssuedKey { key, secret })
    }

    async fn resolve(&self, secret: &str) -> Result<ResolvedKey, AppError> {
        sqlx::query_as::<_, ResolvedKey>(
            r#"
            SELECT k.id, k.account_id, k.label, k.key_prefix, k.key_hash, k.is_active,
                   k.daily_limit, k.created_at, a.is_active AS account_active
            FROM api_keys k
            JOIN accounts a ON a.id = k.account_id
            WHERE k.key_hash = $1 AND k.is_active = true
            "#,
        )
        .bind(hash_secret(secret))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::InvalidApiKey)
    }

    async fn revoke(&self, key_id: Uuid, account_id: Uuid) -> Result<ApiKey, AppError> {
        let owner: Uuid = sqlx::query_scalar("SELECT account_id FROM api_keys WHERE id = $1")
            .bind(key_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("API key"))?;

        if owner != account_id {
            return Err(AppError::Forbidden);
        }

        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            UPDATE api_keys
            SET is_active = false
            WHERE id = $1 AND account_id = $2
            RETURNING id, account_id, label, key_prefix, key_hash, is_active, daily_limit, created_at
            "#,
        )
        .bind(key_id)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(%key_id, %account_id, "api key revoked");

        Ok(key)
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, account_id, label, key_prefix, key_hash, is_active, daily_limit, created_at
            FROM api_keys
            WHERE account_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }
}
