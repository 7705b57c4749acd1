//! API Key model for partner authentication.
//!
//! Partners send their key in the `X-API-KEY` header. Keys are stored in the database as
//! SHA-256 hashes; the plaintext secret is returned exactly once, when the key is issued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Fixed prefix that makes secrets recognizable in logs and config files.
pub const KEY_PREFIX: &str = "dn7x7_";

/// Length of the stored display prefix (`KEY_PREFIX` plus 8 random characters).
const DISPLAY_PREFIX_LEN: usize = KEY_PREFIX.len() + 8;

/// Label used when the caller gives none.
pub const DEFAULT_LABEL: &str = "My API Key";

pub const MAX_LABEL_LEN: usize = 50;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table. Keys are never hard-deleted: revoking clears `is_active`
/// so usage log rows keep a valid reference.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// Account the key draws credits from
    pub account_id: Uuid,

    /// Human-readable label chosen by the owner
    pub label: String,

    /// First characters of the secret, safe to display
    pub key_prefix: String,

    /// SHA-256 hash of the secret (64 hex characters)
    pub key_hash: String,

    /// Inactive keys are rejected exactly like unknown ones.
    pub is_active: bool,

    /// Maximum calls per calendar day for this key
    pub daily_limit: i32,

    /// Timestamp when this API key was created
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Per-key daily call cap. Independent of the account's credits.
    pub fn daily_cap(&self) -> i64 {
        i64::from(self.daily_limit)
    }
}

/// A key looked up by its secret, together with its owner's liveness.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResolvedKey {
    #[sqlx(flatten)]
    pub key: ApiKey,

    pub account_active: bool,
}

/// A freshly issued key and its plaintext secret.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub key: ApiKey,
    pub secret: String,
}

/// Fields of a key about to be stored.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub account_id: Uuid,
    pub label: String,
    pub key_prefix: String,
    pub key_hash: String,
    pub daily_limit: i32,
}

impl NewApiKey {
    /// Validate the request and derive the stored fields from a fresh secret.
    pub fn prepare(
        account_id: Uuid,
        request: &CreateApiKeyRequest,
        default_daily_limit: i32,
    ) -> Result<(Self, String), String> {
        let label = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_LABEL);

        if label.chars().count() > MAX_LABEL_LEN {
            return Err(format!("Key name must be at most {MAX_LABEL_LEN} characters"));
        }

        let daily_limit = request.daily_limit.unwrap_or(default_daily_limit);
        if daily_limit <= 0 {
            return Err("daily_limit must be a positive integer".to_string());
        }

        let secret = generate_secret();
        let new_key = Self {
            account_id,
            label: label.to_string(),
            key_prefix: secret[..DISPLAY_PREFIX_LEN].to_string(),
            key_hash: hash_secret(&secret),
            daily_limit,
        };
        Ok((new_key, secret))
    }
}

/// Generate a new secret: the fixed prefix followed by 32 random hex characters.
pub fn generate_secret() -> String {
    let bytes: [u8; 16] = rand::random();
    format!("{KEY_PREFIX}{}", hex::encode(bytes))
}

/// SHA-256 hex digest under which a secret is stored and looked up.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Request body for creating a key.
///
/// ```json
/// { "name": "Newsroom integration", "daily_limit": 500 }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: Option<String>,
    pub daily_limit: Option<i32>,
}

/// Response body for key endpoints.
///
/// The `key` field is only present in the response to key creation.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "My API Key",
///   "key_prefix": "dn7x7_1a2b3c4d",
///   "key": "dn7x7_1a2b3c4d...",
///   "created_at": "2025-01-15T10:30:00Z",
///   "is_active": true,
///   "daily_limit": 1000
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub daily_limit: i32,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.label,
            key_prefix: key.key_prefix,
            key: None,
            created_at: key.created_at,
            is_active: key.is_active,
            daily_limit: key.daily_limit,
        }
    }
}

impl From<IssuedKey> for ApiKeyResponse {
    fn from(issued: IssuedKey) -> Self {
        let mut response = Self::from(issued.key);
        response.key = Some(issued.secret);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_carry_prefix_and_random_tail() {
        let a = generate_secret();
        let b = generate_secret();
        assert!(a.starts_with(KEY_PREFIX));
        assert_eq!(a.len(), KEY_PREFIX.len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_and_hides_secret() {
        let secret = "dn7x7_00112233445566778899aabbccddeeff";
        let hash = hash_secret(secret);
        assert_eq!(hash, hash_secret(secret));
        assert_eq!(hash.len(), 64);
        assert!(!hash.contains("dn7x7_"));
    }

    #[test]
    fn prepare_applies_defaults() {
        let account = Uuid::new_v4();
        let (key, secret) =
            NewApiKey::prepare(account, &CreateApiKeyRequest::default(), 1000).unwrap();
        assert_eq!(key.label, DEFAULT_LABEL);
        assert_eq!(key.daily_limit, 1000);
        assert_eq!(key.key_hash, hash_secret(&secret));
        assert!(secret.starts_with(&key.key_prefix));
    }

    #[test]
    fn prepare_rejects_bad_input() {
        let account = Uuid::new_v4();
        let zero_limit = CreateApiKeyRequest {
            name: None,
            daily_limit: Some(0),
        };
        assert!(NewApiKey::prepare(account, &zero_limit, 1000).is_err());

        let long_name = CreateApiKeyRequest {
            name: Some("x".repeat(51)),
            daily_limit: None,
        };
        assert!(NewApiKey::prepare(account, &long_name, 1000).is_err());
    }

    #[test]
    fn listing_response_omits_secret() {
        let (new_key, _) =
            NewApiKey::prepare(Uuid::new_v4(), &CreateApiKeyRequest::default(), 10).unwrap();
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
        let json = serde_json::to_value(ApiKeyResponse::from(key)).unwrap();
        assert!(json.get("key").is_none());
        assert!(json.get("key_hash").is_none());
    }
}
