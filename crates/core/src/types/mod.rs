//! Core types for Nube Bridge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod event;
pub mod id;
pub mod status;

pub use event::{EntityAction, EventError, EventKind, PrivacyEvent, WebhookEvent};
pub use id::*;
pub use status::*;
