use crate::attestation::Attestation;
use crate::hash::Hash;
use crate::signature::BlsSignature;
use crate::transaction::SignedTransaction;
use std::fmt;

/// Block header containing chain linkage and slot information.
///
/// The header digest IS the block hash; fields are hashed in declared order.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlockHeader {
    /// Block height (contiguous, genesis = 0)
    pub height: u64,
    /// Slot this block was proposed in (monotonic, may skip)
    pub slot: u64,
    /// Hash of the parent block header
    pub previous_header_hash: Hash,
    /// Digest over the block's transaction ids
    pub transactions_root: Hash,
    /// Unix timestamp (seconds)
    pub timestamp: u64,
}

impl BlockHeader {
    /// Create a new block header
    pub fn new(
        height: u64,
        slot: u64,
        previous_header_hash: Hash,
        transactions_root: Hash,
        timestamp: u64,
    ) -> Self {
        Self {
            height,
            slot,
            previous_header_hash,
            transactions_root,
            timestamp,
        }
    }

    /// Compute the hash of this block header
    pub fn compute_hash(&self) -> Hash {
        let mut data = Vec::with_capacity(88);
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(&self.slot.to_le_bytes());
        data.extend_from_slice(self.previous_header_hash.as_bytes());
        data.extend_from_slice(self.transactions_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        Hash::compute(&data)
    }

    /// Check if this is a genesis header
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// Complete block: header, payload, and the proposer's RANDAO reveal.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<SignedTransaction>,
    /// Attestations the proposer chose to include from its beacon pool
    pub attestations: Vec<Attestation>,
    /// Proposer's BLS signature over the epoch number
    pub randao_reveal: BlsSignature,
    /// Cached header digest
    pub hash: Hash,
}

impl Block {
    /// Create a new sealed block (hash computed from the header).
    pub fn new(
        header: BlockHeader,
        transactions: Vec<SignedTransaction>,
        attestations: Vec<Attestation>,
        randao_reveal: BlsSignature,
    ) -> Self {
        let hash = header.compute_hash();
        Self {
            header,
            transactions,
            attestations,
            randao_reveal,
            hash,
        }
    }

    /// Digest over a transaction list: `H(concat(txid...))`, `Hash::ZERO`
    /// when empty.
    pub fn transactions_root(transactions: &[SignedTransaction]) -> Hash {
        if transactions.is_empty() {
            return Hash::ZERO;
        }
        let mut data = Vec::with_capacity(transactions.len() * Hash::LEN);
        for tx in transactions {
            data.extend_from_slice(tx.id().as_bytes());
        }
        Hash::compute(&data)
    }

    /// Get the block hash
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Recompute the hash and compare against the cached value.
    pub fn verify_hash(&self) -> bool {
        self.header.compute_hash() == self.hash
    }

    /// Check that the header's transactions root matches the payload.
    pub fn verify_transactions_root(&self) -> bool {
        Self::transactions_root(&self.transactions) == self.header.transactions_root
    }

    /// Get the block height
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Get the slot
    pub fn slot(&self) -> u64 {
        self.header.slot
    }

    /// Get transaction count
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Check if this is a genesis block
    pub fn is_genesis(&self) -> bool {
        self.header.is_genesis()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {{ height: {}, slot: {}, hash: {}, txs: {}, atts: {} }}",
            self.height(),
            self.slot(),
            self.hash.short(),
            self.tx_count(),
            self.attestations.len()
        )
    }
}
