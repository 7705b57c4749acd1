//! Bearer-token authentication for the account dashboard and admin routes.
//!
//! Access tokens are issued by the account service; this middleware only verifies them:
//! 1. Extract the token from the `Authorization: Bearer <token>` header
//! 2. Verify the HS256 signature and expiry
//! 3. Load the account named by the `user_id` claim and check it is active
//! 4. Inject a [`SessionContext`] into the request
//!
//! Any failure is reported as 401 Unauthorized.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::account::Account, state::AppState};

/// Claims of a dashboard access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account the token was issued to
    pub user_id: Uuid,

    /// Expiry, seconds since the epoch
    pub exp: i64,

    /// `access` or `refresh`; refresh tokens are not accepted here
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Authenticated dashboard caller.
///
/// Handlers extract it with `Extension<SessionContext>`.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub account: Account,
}

/// Verify a token and return its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected dashboard token");
            AppError::Unauthorized
        })?;

    if claims.token_type.as_deref().is_some_and(|t| t != "access") {
        return Err(AppError::Unauthorized);
    }

    Ok(claims)
}

/// Session middleware for dashboard routes.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_token(token, &state.settings.jwt_secret)?;

    let account = state
        .accounts
        .find(claims.user_id)
        .await?
        .filter(|account| account.is_active)
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(SessionContext { account });

    Ok(next.run(request).await)
}

/// Admin guard. Must run after [`require_session`].
pub async fn require_staff(request: Request, next: Next) -> Result<Response, AppError> {
    let is_staff = request
        .extensions()
        .get::<SessionContext>()
        .ok_or(AppError::Unauthorized)?
        .account
        .is_staff;

    if !is_staff {
        return Err(AppError::AdminRequired);
    }

    Ok(next.run(request).await)
}
