//! Error taxonomy for the cognitive state engine.
//!
//! Components return these typed errors at the contract boundaries; the
//! orchestration layer wraps them in `anyhow` with call-site context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Perception producer returned malformed or missing fields.
    /// The turn proceeds with a conservative default record.
    #[error("perception classification failed: {0}")]
    Classification(String),

    /// Completion service failed after the reduced-parameter retry.
    /// Recoverable: the previously committed state is untouched.
    #[error("completion service failed: {0}")]
    Completion(String),

    /// An out-of-range or non-finite value was detected before commit.
    /// Fatal for that write only; the previous valid state is retained.
    #[error("state invariant violated in {field}: {value}")]
    InvariantViolation { field: &'static str, value: f32 },

    /// Store failure. In-memory state is retained so the next successful
    /// save can recover it.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Direct trait assignment attempted after `lock_genesis`.
    #[error("genesis traits are locked; direct edits are refused")]
    GenesisLocked,
}

impl CoreError {
    /// Whether the caller can keep the session alive after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CoreError::InvariantViolation { .. })
    }
}
