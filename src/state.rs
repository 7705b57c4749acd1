//! Shared application state injected into every handler and middleware.

use std::sync::Arc;

use crate::{
    config::Settings,
    services::{
        accounts::AccountDirectory, content::ContentRepository, credit_ledger::CreditLedger,
        key_registry::KeyRegistry, usage_log::UsageLog,
    },
};

/// Collaborators and settings, cheap to clone (everything is behind an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountDirectory>,
    pub ledger: Arc<dyn CreditLedger>,
    pub registry: Arc<dyn KeyRegistry>,
    pub usage: Arc<dyn UsageLog>,
    pub content: Arc<dyn ContentRepository>,
    pub settings: Arc<Settings>,
}
