//! Router-level test harness.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

use super::memory::{
    InMemoryAccounts, InMemoryContent, InMemoryKeyRegistry, InMemoryLedger, InMemoryUsageLog,
};
use crate::{
    config::Settings,
    middleware::{admission::API_KEY_HEADER, session::Claims},
    models::{
        api_key::{CreateApiKeyRequest, IssuedKey},
        news::NewsPost,
    },
    services::key_registry::KeyRegistry,
    state::AppState,
};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";

const DAILY_FREE_CREDITS: i64 = 20;

/// A valid one-hour access token for `account_id`.
pub fn token_for(account_id: Uuid) -> String {
    let claims = Claims {
        user_id: account_id,
        exp: Utc::now().timestamp() + 3600,
        token_type: Some("access".to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// A post whose publication time grows with its id, so higher ids list first.
pub fn news_post(id: u64, title: &str) -> NewsPost {
    let epoch: NaiveDateTime = NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();

    NewsPost {
        id,
        title: title.to_string(),
        slug: format!("story-{id}"),
        content: format!("<p>{title} body</p>"),
        image: None,
        published_at: epoch + chrono::Duration::minutes(id as i64),
        categories: Vec::new(),
    }
}

fn test_settings() -> Settings {
    Settings {
        metered_prefix: "/api/news".to_string(),
        ledger_timeout: Duration::from_secs(2),
        default_page_size: 20,
        max_page_size: 10,
        categories: "indian=23;global=24;blog=1".parse().unwrap(),
        public_base_url: Url::parse("https://dairynews7x7.com/news/").unwrap(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
    }
}

/// The full router wired to in-memory collaborators.
pub struct TestApp {
    pub state: AppState,
    pub accounts: Arc<InMemoryAccounts>,
    pub ledger: Arc<InMemoryLedger>,
    pub registry: Arc<InMemoryKeyRegistry>,
    pub usage: Arc<InMemoryUsageLog>,
    pub content: Arc<InMemoryContent>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let accounts = Arc::new(InMemoryAccounts::new());
        let ledger = Arc::new(InMemoryLedger::new(DAILY_FREE_CREDITS));
        let registry = Arc::new(InMemoryKeyRegistry::with_accounts(1000, accounts.clone()));
        let usage = Arc::new(InMemoryUsageLog::new(registry.clone()));
        let content = Arc::new(InMemoryContent::new());

        let state = AppState {
            accounts: accounts.clone(),
            ledger: ledger.clone(),
            registry: registry.clone(),
            usage: usage.clone(),
            content: content.clone(),
            settings: Arc::new(test_settings()),
        };

        Self {
            router: crate::build_router(state.clone()),
            state,
            accounts,
            ledger,
            registry,
            usage,
            content,
        }
    }

    /// Active account with a fresh ledger holding the given balances.
    pub fn account(&self, free: i64, purchased: i64) -> Uuid {
        let id = self.accounts.insert(false);
        self.ledger.seed(id, free, purchased);
        id
    }

    pub fn account_without_ledger(&self) -> Uuid {
        self.accounts.insert(false)
    }

    pub fn staff_account(&self) -> Uuid {
        let id = self.accounts.insert(true);
        self.ledger.seed(id, DAILY_FREE_CREDITS, 0);
        id
    }

    pub async fn key(&self, account_id: Uuid, daily_limit: i32) -> IssuedKey {
        let request = CreateApiKeyRequest {
            name: None,
            daily_limit: Some(daily_limit),
        };
        self.registry.issue(account_id, &request).await.unwrap()
    }

    pub async fn get(&self, path: &str, api_key: Option<&str>) -> (StatusCode, Value) {
        match api_key {
            Some(key) => self.get_with_headers(path, &[(API_KEY_HEADER, key)]).await,
            None => self.get_with_headers(path, &[]).await,
        }
    }

    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut request = Request::builder().method("GET").uri(path);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    /// GET with a dashboard token for `account_id`.
    pub async fn get_as(&self, account_id: Uuid, path: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .header("Authorization", format!("Bearer {}", token_for(account_id)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// JSON POST with a dashboard token for `account_id`.
    pub async fn post_as(&self, account_id: Uuid, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Authorization", format!("Bearer {}", token_for(account_id)))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}
