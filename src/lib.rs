//! # FCM Agent Library
//!
//! Sends Firebase Cloud Messaging notifications with OAuth2 access tokens
//! that are cached per project, refreshed before they expire and
//! regenerated with bounded exponential backoff.
//!
//! Modules:
//! - `cache`: token manager: cache, retry bookkeeping, scheduled invalidation
//! - `credentials`: service account keys and the access token generator
//! - `messaging`: message building, validation, provider client, operations
//! - `config`: YAML configuration, loading and validation
//! - `observability`: prometheus metrics and the `/metrics` route

pub mod cache;
pub mod config;
pub mod credentials;
pub mod helpers;
pub mod messaging;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod tests;
pub mod utils;

pub use crate::cache::token_manager::TokenManager;
pub use crate::config::projects::ServiceConfig;
pub use crate::messaging::operation::{Dispatcher, OperationRequest};
