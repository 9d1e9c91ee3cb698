//! # parkfeed
//!
//! Keeps theme-park datasets from an OAuth2-protected upstream API cached
//! and fresh, with client credentials bootstrapped from an encrypted remote
//! config bundle.
//!
//! Modules:
//! - `config`: YAML service configuration, defaults and validation
//! - `credentials` / `crypto`: remote credential resolution and Blowfish decoding
//! - `auth`: OAuth2 token lifecycle and refresh loop
//! - `upstream`: authenticated upstream calls and the dataset catalogue
//! - `cache`: fast/slow dataset refresh loops
//! - `store`: persistence backends for tokens and cache entries
//! - `health`: daily remote health probe and credential refresh

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod errors;
pub mod health;
pub mod helpers;
pub mod observability;
pub mod server;
pub mod store;
pub mod upstream;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::sources::*;
pub use crate::errors::ServiceError;
