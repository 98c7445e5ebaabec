//! Composite import identifier parsing
//!
//! Import reconstructs local state from a single operator-supplied string,
//! commonly `parent/resource` or `parent/type/resource`. The segment count
//! is enforced exactly; anything else is a format error surfaced to the
//! operator before any remote call is made.

use crate::error::ImportIdError;

/// Split a slash-delimited import identifier into exactly `N` segments.
///
/// `expected` documents the format for the error message,
/// e.g. `"zoneID/filterID"`. Empty segments are rejected.
pub fn split_import_id<const N: usize>(
    id: &str,
    expected: &'static str,
) -> Result<[String; N], ImportIdError> {
    let segments: Vec<String> = id.split('/').map(str::to_string).collect();
    if segments.len() != N || segments.iter().any(String::is_empty) {
        return Err(ImportIdError {
            id: id.to_string(),
            expected,
        });
    }

    // Length was checked above, so the conversion cannot fail.
    segments.try_into().map_err(|_| ImportIdError {
        id: id.to_string(),
        expected,
    })
}
