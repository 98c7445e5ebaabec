//! Strato reconciliation primitives
//!
//! This crate holds the small set of mechanisms shared by every resource
//! reconciler: the bounded polling loop used to wait for asynchronous remote
//! state transitions, the append/remove delta for unordered membership lists,
//! derived identities for resources the remote API does not key naturally,
//! and composite import-identifier parsing.
//!
//! Provider crates (e.g. `strato-cloudflare`) build their per-resource
//! Create/Read/Update/Delete/Import operations on top of these pieces; this
//! crate performs no network I/O of its own.

pub mod delta;
pub mod error;
pub mod identity;
pub mod import;
pub mod poll;
pub mod scope;

// Re-exports
pub use delta::{SetDelta, set_delta};
pub use error::{ImportIdError, PollError};
pub use identity::checksum_id;
pub use import::split_import_id;
pub use poll::{Poll, PollPolicy, poll_until};
pub use scope::Scope;
