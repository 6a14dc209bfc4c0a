//! FIFO pool of pending signed transactions awaiting inclusion.

use forkcast_types::{Hash, SignedTransaction};
use std::collections::HashSet;

/// Deduplicating FIFO transaction pool.
#[derive(Debug, Default)]
pub struct Mempool {
    transactions: Vec<SignedTransaction>,
    ids: HashSet<Hash>,
}

impl Mempool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a transaction; duplicates (by txid) are dropped.
    pub fn submit(&mut self, transaction: SignedTransaction) -> bool {
        if !self.ids.insert(transaction.id()) {
            return false;
        }
        self.transactions.push(transaction);
        true
    }

    /// Oldest `n` pending transactions, without removing them. Entries are
    /// dropped when a block including them is applied.
    pub fn peek(&self, n: usize) -> Vec<SignedTransaction> {
        self.transactions.iter().take(n).cloned().collect()
    }

    /// Drop the transactions with the given ids.
    pub fn remove(&mut self, txids: &[Hash]) {
        if txids.is_empty() {
            return;
        }
        let drop: HashSet<&Hash> = txids.iter().collect();
        self.transactions.retain(|tx| !drop.contains(&tx.id()));
        for txid in txids {
            self.ids.remove(txid);
        }
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Check membership by txid.
    pub fn contains(&self, txid: &Hash) -> bool {
        self.ids.contains(txid)
    }

    /// Pending transaction count and total outflow for a sender. Used to
    /// pick the next nonce and to bound further spending.
    pub fn pending_from(&self, sender: &forkcast_types::Address) -> (u64, u64) {
        self.transactions
            .iter()
            .filter(|tx| tx.tx.from == *sender)
            .fold((0, 0), |(count, outflow), tx| {
                (count + 1, outflow + tx.tx.value)
            })
    }
}
