//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Chain integrity problems are not errors: validation reports them as
/// [`crate::chain::ValidationFailure`] values.
#[derive(Error, Debug)]
pub enum Error {
    /// Consensus parameters that cannot seal a block (empty validator set,
    /// zero total stake, unreachable difficulty)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Mining stopped through a cancel token before a nonce was found
    #[error("Sealing of block {index} cancelled after {attempts} attempts")]
    SealingCancelled {
        /// Index of the block being sealed
        index: u64,
        /// Nonces tried before cancellation
        attempts: u64,
    },

    /// Mining ran out of its attempt budget
    #[error("Sealing of block {index} exhausted its budget of {attempts} attempts")]
    SealingExhausted {
        /// Index of the block being sealed
        index: u64,
        /// Nonces tried
        attempts: u64,
    },

    /// Configuration file or environment error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the two mining outcomes that stop short of a seal
    pub fn is_sealing_interrupted(&self) -> bool {
        matches!(
            self,
            Error::SealingCancelled { .. } | Error::SealingExhausted { .. }
        )
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
