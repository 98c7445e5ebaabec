//! Derived identities
//!
//! A few remote APIs expose no natural identifier (singleton configurations,
//! endpoints keyed by a parent scope). Those resources derive a stable
//! identity by hashing the scope and type strings that address them. The
//! hash algorithm is an implementation detail of this crate, not part of any
//! remote contract; only stability within one release line matters.

use sha2::{Digest, Sha256};

/// Derive a stable identifier from an addressing string,
/// e.g. `"<zone-id>/custom_hostnames_fallback_origin"`.
pub fn checksum_id(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
