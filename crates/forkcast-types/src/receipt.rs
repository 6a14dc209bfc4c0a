use crate::address::Address;
use crate::hash::Hash;
use std::fmt;

/// Result of executing a transaction inside an applied block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Id of the transaction
    pub tx_hash: Hash,
    /// Index of the transaction in the block
    pub tx_index: u32,
    /// Hash of the block containing this TX
    pub block_hash: Hash,
    /// Height of the block containing this TX
    pub block_height: u64,
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Transferred value in whole ETH
    pub value: u64,
    /// Whether the transaction succeeded
    pub status: bool,
}

impl TransactionReceipt {
    /// Create a new receipt
    pub fn new(
        tx_hash: Hash,
        tx_index: u32,
        block_hash: Hash,
        block_height: u64,
        from: Address,
        to: Address,
        value: u64,
        status: bool,
    ) -> Self {
        Self {
            tx_hash,
            tx_index,
            block_hash,
            block_height,
            from,
            to,
            value,
            status,
        }
    }

    /// Check if transaction succeeded
    pub fn is_success(&self) -> bool {
        self.status
    }
}

impl fmt::Display for TransactionReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Receipt {{ tx: {}, block: {}, status: {} }}",
            self.tx_hash.short(),
            self.block_hash.short(),
            if self.status { "success" } else { "failure" },
        )
    }
}
