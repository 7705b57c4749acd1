//! Test utilities.
//!
//! This module provides:
//! - In-memory implementations of the collaborator traits
//! - `TestApp`, which drives the real router over those implementations
//! - Small factories for posts and dashboard tokens

mod app;
mod memory;

pub use app::*;
pub use memory::*;
