//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, auth context)
//! 2. Calls the collaborators held in `AppState`
//! 3. Returns HTTP response (JSON, status code)

/// Staff-only account administration
pub mod admin;
/// Account owner dashboard
pub mod dashboard;
/// Service health
pub mod health;
/// Metered partner news API
pub mod news;
