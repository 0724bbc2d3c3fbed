//! Error types for Project Horde.

use thiserror::Error;

/// Top-level error type for Horde operations.
///
/// Subsystem crates define their own focused error enums and convert into
/// this one at API boundaries.
#[derive(Debug, Error)]
pub enum HordeError {
    /// A referenced entity or record does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of thing that was looked up
        kind: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// A finite resource (identifier space, capacity) ran out
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A state invariant was violated
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration or data file could not be used
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Horde operations.
pub type HordeResult<T> = Result<T, HordeError>;
