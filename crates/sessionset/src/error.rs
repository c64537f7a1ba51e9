//! Error types for session registry operations.

/// Error type for session registry operations.
///
/// Lookups, writes and pruning never fail; these variants cover the edges
/// where the registry talks to the outside world.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The randomness source could not produce bytes for a token.
    #[error("Entropy source failed: {0}")]
    Entropy(String),

    /// A configuration value is out of range.
    #[error("Invalid registry config: {0}")]
    InvalidConfig(String),
}

/// Result type for session registry operations.
pub type Result<T> = std::result::Result<T, Error>;
