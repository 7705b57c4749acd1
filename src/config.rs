//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct,
//! then derives the immutable [`Settings`] shared with every request through `AppState`.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::models::news::CategoryMap;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string (accounts, ledger, keys, logs)
/// - `NEWS_DATABASE_URL` (required): MySQL connection string of the WordPress content source
/// - `JWT_SECRET` (required): HS256 secret used to verify dashboard access tokens
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): Postgres pool size, defaults to 5
/// - `METERED_PREFIX` (optional): path prefix gated by the admission gateway, defaults to `/api/news`
/// - `DAILY_FREE_CREDITS` (optional): free credits granted each calendar day, defaults to 20
/// - `DEFAULT_DAILY_LIMIT` (optional): daily call cap of newly issued keys, defaults to 1000
/// - `LEDGER_LOCK_TIMEOUT_MS` (optional): bound on the ledger row-lock wait, defaults to 2000
/// - `DEFAULT_PAGE_SIZE` / `MAX_PAGE_SIZE` (optional): list pagination, default 20 / 10
/// - `NEWS_CATEGORIES` (optional): category table, `token=id[,id];token=id`
/// - `NEWS_PUBLIC_BASE_URL` (optional): base URL that article slugs are appended to
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub news_database_url: String,

    pub jwt_secret: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_metered_prefix")]
    pub metered_prefix: String,

    #[serde(default = "default_daily_free_credits")]
    pub daily_free_credits: i64,

    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: i32,

    #[serde(default = "default_lock_timeout_ms")]
    pub ledger_lock_timeout_ms: u64,

    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,

    #[serde(default = "default_news_categories")]
    pub news_categories: String,

    #[serde(default = "default_public_base_url")]
    pub news_public_base_url: String,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_metered_prefix() -> String {
    "/api/news".to_string()
}

fn default_daily_free_credits() -> i64 {
    20
}

fn default_daily_limit() -> i32 {
    1000
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_page_size() -> i64 {
    20
}

fn default_max_page_size() -> i64 {
    10
}

fn default_news_categories() -> String {
    "indian=23;global=24;blog=1".to_string()
}

fn default_public_base_url() -> String {
    "https://dairynews7x7.com/news/".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// Build the request-time settings.
    ///
    /// Fails when the category table or the public base URL is malformed, or when a
    /// numeric limit is out of range. Startup aborts in that case.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let categories: CategoryMap = self
            .news_categories
            .parse()
            .context("NEWS_CATEGORIES is malformed")?;

        // Slugs are joined onto the base, which only appends when the path ends in '/'
        let mut base = self.news_public_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let public_base_url = Url::parse(&base).context("NEWS_PUBLIC_BASE_URL is not a URL")?;

        let metered_prefix = self.metered_prefix.trim_end_matches('/').to_string();
        anyhow::ensure!(
            metered_prefix.starts_with('/'),
            "METERED_PREFIX must be an absolute path below the root"
        );
        anyhow::ensure!(self.max_page_size >= 1, "MAX_PAGE_SIZE must be at least 1");
        anyhow::ensure!(self.default_page_size >= 1, "DEFAULT_PAGE_SIZE must be at least 1");
        anyhow::ensure!(self.daily_free_credits >= 0, "DAILY_FREE_CREDITS must not be negative");
        anyhow::ensure!(self.default_daily_limit >= 1, "DEFAULT_DAILY_LIMIT must be positive");
        // Postgres reads a zero lock_timeout as "wait forever"
        anyhow::ensure!(
            self.ledger_lock_timeout_ms >= 1,
            "LEDGER_LOCK_TIMEOUT_MS must be at least 1"
        );

        Ok(Settings {
            metered_prefix,
            ledger_timeout: Duration::from_millis(self.ledger_lock_timeout_ms),
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            categories,
            public_base_url,
            jwt_secret: self.jwt_secret.clone(),
        })
    }
}

/// Immutable settings consulted on the request path.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Requests under this prefix go through the admission gateway.
    pub metered_prefix: String,

    /// Upper bound on how long a request may wait for its ledger row.
    pub ledger_timeout: Duration,

    pub default_page_size: i64,

    pub max_page_size: i64,

    /// Category token → content source category ids. Loaded once, never mutated.
    pub categories: CategoryMap,

    /// Article URLs are `public_base_url` joined with the post slug.
    pub public_base_url: Url,

    /// HS256 secret for dashboard access tokens.
    pub jwt_secret: String,
}
