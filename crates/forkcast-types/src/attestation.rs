use crate::address::Address;
use crate::hash::Hash;
use std::fmt;

/// Epoch-boundary anchor for Casper FFG votes.
///
/// `root` is the hash of the highest canonical block whose slot is at or
/// before the epoch's checkpoint slot; `Hash::ZERO` stands for "no block".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Checkpoint {
    /// Epoch number
    pub epoch: u64,
    /// Block root (hash)
    pub root: Hash,
}

impl Checkpoint {
    /// Create a new checkpoint.
    pub fn new(epoch: u64, root: Hash) -> Self {
        Self { epoch, root }
    }

    /// Check whether the checkpoint carries a real block root.
    pub fn has_root(&self) -> bool {
        !self.root.is_zero()
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(epoch {}, {})", self.epoch, self.root.short())
    }
}

/// A validator's vote endorsing a block, optionally carrying Casper FFG
/// source/target checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// Attesting validator
    pub validator: Address,
    /// Block being endorsed
    pub block_hash: Hash,
    /// Unix timestamp (milliseconds); drives latest-message replacement
    pub timestamp: u64,
    /// FFG source checkpoint
    pub source: Option<Checkpoint>,
    /// FFG target checkpoint
    pub target: Option<Checkpoint>,
}

impl Attestation {
    /// Create a head-only attestation without FFG checkpoints.
    pub fn new(validator: Address, block_hash: Hash, timestamp: u64) -> Self {
        Self {
            validator,
            block_hash,
            timestamp,
            source: None,
            target: None,
        }
    }

    /// Attach FFG source and target checkpoints.
    pub fn with_checkpoints(mut self, source: Checkpoint, target: Checkpoint) -> Self {
        self.source = Some(source);
        self.target = Some(target);
        self
    }

    /// Check whether both FFG checkpoints are present.
    pub fn has_ffg(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }

    /// Key identifying this vote in the processed-attestation set.
    pub fn processed_key(&self) -> (Hash, Address) {
        (self.block_hash, self.validator)
    }
}

impl fmt::Display for Attestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attestation {{ validator: {}, block: {} }}",
            self.validator.short(),
            self.block_hash.short()
        )
    }
}
