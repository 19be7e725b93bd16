//! Nube Bridge Core - Shared types library.
//!
//! This crate provides common types used across all Nube Bridge components:
//! - `bridge` - Webhook ingestion and catalog/order reconciliation service
//! - `cli` - Command-line tools for migrations and operator-triggered syncs
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, webhook event classification, and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
