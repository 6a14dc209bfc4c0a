use forkcast_consensus::ConsensusError;
use forkcast_types::Hash;
use thiserror::Error;

/// Errors that can occur in chain operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChainError {
    #[error("Unknown parent for block {0}")]
    UnknownParent(Hash),

    #[error("Invalid block {hash}: {reason}")]
    InvalidBlock { hash: Hash, reason: String },

    #[error("Structurally invalid chain: {0}")]
    InvalidChain(String),

    #[error("Head reconciliation gave up after {0} attempts")]
    ReorgRetriesExhausted(u32),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),
}

impl ChainError {
    /// Shorthand for an invalid-block error.
    pub fn invalid(hash: Hash, reason: impl Into<String>) -> Self {
        ChainError::InvalidBlock {
            hash,
            reason: reason.into(),
        }
    }
}
