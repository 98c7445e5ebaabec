//! Reconciliation error types

use thiserror::Error;

/// A composite import identifier did not match the documented format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid import id {id:?}, expected format {expected:?}")]
pub struct ImportIdError {
    /// The identifier as supplied by the operator.
    pub id: String,

    /// Human-readable description of the expected format,
    /// e.g. `"zoneID/filterID"`.
    pub expected: &'static str,
}

/// Outcome of a bounded polling loop that did not reach its terminal state.
#[derive(Error, Debug)]
pub enum PollError<E> {
    /// The attempt budget was exhausted while the remote entity was still
    /// in a transitional state.
    #[error("gave up after {attempts} attempts: {last}")]
    TimedOut {
        /// Number of attempts actually made.
        attempts: u32,
        /// The last transitional condition observed.
        last: String,
    },

    /// The operation hit a non-retryable error and aborted immediately.
    #[error(transparent)]
    Aborted(E),
}
