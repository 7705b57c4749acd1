//! HTTP middleware components.
//!
//! Middleware run before route handlers. They can:
//! - Authenticate requests
//! - Meter and log requests
//! - Short-circuit requests (reject unauthorized or unpaid calls)

/// API key admission and credit metering for the partner API
pub mod admission;
/// Bearer-token sessions for dashboard and admin routes
pub mod session;
