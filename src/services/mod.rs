//! Business logic services.
//!
//! Each collaborator of the admission gateway is a trait with a database-backed
//! implementation. Handlers and middleware only see the traits, through `AppState`.

pub mod accounts;
pub mod content;
pub mod credit_ledger;
pub mod key_registry;
pub mod usage_log;
