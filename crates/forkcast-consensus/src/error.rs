use forkcast_types::Hash;
use thiserror::Error;

/// Errors that can occur in consensus operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConsensusError {
    #[error("Duplicate block: {0}")]
    DuplicateBlock(Hash),

    #[error("Unknown parent: {0}")]
    UnknownParent(Hash),

    #[error("Unknown block: {0}")]
    UnknownBlock(Hash),

    #[error("The null root cannot be the ghost head")]
    NullRootHead,

    #[error("Validator set is empty")]
    EmptyValidatorSet,

    #[error("Unknown validator: {0}")]
    UnknownValidator(String),

    #[error("RANDAO mix missing for epoch {0}")]
    MissingRandaoMix(u64),

    #[error("Invalid attestation: {0}")]
    InvalidAttestation(String),
}
