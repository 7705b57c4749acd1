//! News Credit Gateway - Main Application Entry Point
//!
//! This is the metering front of a multi-tenant news API. Partner requests carry an API key,
//! are checked against the key's daily call cap and paid for from the owning account's credit
//! ledger before the news content is served. Account owners manage keys and look at their
//! balance through a token-authenticated dashboard, and staff can top up credits and ban accounts.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (accounts, ledgers, keys, usage logs)
//! - **Content Source**: WordPress MySQL database, read only
//! - **Authentication**: API key with SHA-256 hashing (partners), HS256 bearer tokens (dashboard)
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pools
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

#[cfg(test)]
mod test_utils;

use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    services::{
        accounts::PgAccountDirectory, content::WordpressRepository,
        credit_ledger::PgCreditLedger, key_registry::PgKeyRegistry, usage_log::PgUsageLog,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    let settings = config.settings()?;
    tracing::info!(metered_prefix = %settings.metered_prefix, "Configuration loaded");

    // Create database pools
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    let news_pool = db::create_news_pool(&config.news_database_url)?;
    tracing::info!("Database pools created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let state = AppState {
        accounts: Arc::new(PgAccountDirectory::new(pool.clone())),
        ledger: Arc::new(PgCreditLedger::new(
            pool.clone(),
            config.daily_free_credits,
            settings.ledger_timeout,
        )),
        registry: Arc::new(PgKeyRegistry::new(pool.clone(), config.default_daily_limit)),
        usage: Arc::new(PgUsageLog::new(pool)),
        content: Arc::new(WordpressRepository::new(news_pool)),
        settings: Arc::new(settings),
    };

    let app = build_router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses are exposed so usage logs can record the client IP
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Build the HTTP router over the given state.
pub fn build_router(state: AppState) -> Router {
    let prefix = state.settings.metered_prefix.clone();

    // Metered partner API, served with and without a trailing slash
    let news_routes = Router::new()
        .route(&prefix, get(handlers::news::list_news))
        .route(&format!("{prefix}/"), get(handlers::news::list_news))
        .route(&format!("{prefix}/{{post_id}}"), get(handlers::news::get_news))
        .route(&format!("{prefix}/{{post_id}}/"), get(handlers::news::get_news))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::admission::admission_gateway,
        ));

    // Account owner dashboard
    let dashboard_routes = Router::new()
        .route("/api/dashboard/credits/", get(handlers::dashboard::credits))
        .route("/api/dashboard/list_keys/", get(handlers::dashboard::list_keys))
        .route("/api/dashboard/create_key/", post(handlers::dashboard::create_key))
        .route(
            "/api/dashboard/{id}/revoke_key/",
            post(handlers::dashboard::revoke_key),
        )
        .route("/api/dashboard/logs/", get(handlers::dashboard::logs))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session::require_session,
        ));

    // Staff administration. The last route_layer is outermost, so the session is loaded before the staff check
    let admin_routes = Router::new()
        .route(
            "/api/accounts/admin/users/{id}/add_credits/",
            post(handlers::admin::add_credits),
        )
        .route(
            "/api/accounts/admin/users/{id}/toggle_active/",
            post(handlers::admin::toggle_active),
        )
        .route(
            "/api/accounts/admin/users/{id}/logs/",
            get(handlers::admin::logs),
        )
        .route(
            "/api/accounts/admin/users/{id}/keys/",
            post(handlers::admin::issue_key),
        )
        .route_layer(axum_middleware::from_fn(middleware::session::require_staff))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session::require_session,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .merge(news_routes)
        .merge(dashboard_routes)
        .merge(admin_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
