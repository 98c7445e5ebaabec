//! Strato Cloudflare provider
//!
//! Reconciles declared resource state against the Cloudflare v4 API. Each
//! module under [`resource`] covers one remote resource type and implements
//! the same five operations: create, read, update, delete, import.
//!
//! The contract every resource honors:
//!
//! - identity (`state.id`) is set if and only if a remote entity is believed
//!   to exist; a read that finds nothing clears it and returns `Ok`
//! - read overwrites local attributes with the remote values, remote is the
//!   source of truth
//! - update sends only what changed; membership lists patch append/remove
//!   deltas instead of resending the full set
//! - resources whose remote lifetime is tied to their parent implement
//!   delete as a deliberate no-op
//!
//! Network access goes through [`Client`]; reconcilers talk to it via small
//! per-resource API traits so tests can substitute in-memory fakes.

pub mod client;
pub mod error;
pub mod resource;

// Re-exports
pub use client::{Client, ClientConfig, DEFAULT_API_BASE};
pub use error::{ApiError, Error, Result};
