//! Data models representing database entities and API payloads.

/// Tenant accounts
pub mod account;
/// Partner API keys
pub mod api_key;
/// Two-bucket credit balance
pub mod credit;
/// News content and pagination
pub mod news;
/// Usage log entries
pub mod usage;
