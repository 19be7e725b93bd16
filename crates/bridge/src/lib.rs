//! Nube Bridge library.
//!
//! Receives Tiendanube webhook notifications, verifies and deduplicates
//! them, and reconciles the referenced products and orders into a local
//! relational store. A bulk synchronizer backfills whole collections and
//! removes local products that no longer exist upstream.
//!
//! The HTTP surface lives in [`routes`]; everything below it is usable
//! without a server (see the `nb-cli` binary).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod sync;
pub mod tiendanube;
pub mod webhooks;
