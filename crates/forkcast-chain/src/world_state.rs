//! Execution-layer world state: accounts plus a receipts index.
//!
//! Blocks are validated against a scratch copy of the account map and only
//! committed when every transaction checks out, so a failing block leaves
//! the state untouched.

use crate::error::ChainError;
use forkcast_types::{
    Account, Address, Block, ChainConfig, GenesisAlloc, Hash, TransactionReceipt,
};
use std::collections::HashMap;

/// Account map and receipts index, rebuilt from the canonical chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldState {
    accounts: HashMap<Address, Account>,
    /// blockHash -> txid -> receipt
    receipts: HashMap<Hash, HashMap<Hash, TransactionReceipt>>,
}

impl WorldState {
    /// Create an empty world state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world state seeded with the genesis allocation.
    pub fn from_genesis(alloc: &[GenesisAlloc]) -> Self {
        let mut state = Self::new();
        state.init_genesis(alloc);
        state
    }

    /// Seed the genesis allocation into an empty state.
    pub fn init_genesis(&mut self, alloc: &[GenesisAlloc]) {
        for entry in alloc {
            self.accounts
                .insert(entry.address, Account::with_balance(entry.balance));
        }
    }

    /// Drop all accounts and receipts (reorg rebuild).
    pub fn clear(&mut self) {
        self.accounts.clear();
        self.receipts.clear();
    }

    /// Get account balance (zero for unknown accounts).
    pub fn balance(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    /// Get account nonce (zero for unknown accounts).
    pub fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    /// Borrow an account.
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Number of accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Receipt for a transaction in a given block.
    pub fn receipt(&self, block_hash: &Hash, txid: &Hash) -> Option<&TransactionReceipt> {
        self.receipts.get(block_hash)?.get(txid)
    }

    /// Whether any receipts exist for a block.
    pub fn has_receipts_for(&self, block_hash: &Hash) -> bool {
        self.receipts.contains_key(block_hash)
    }

    /// Validate a block's transactions and, on success, commit them along
    /// with their receipts. Returns the included txids.
    ///
    /// Rules: the first transaction must be the coinbase (sender is the
    /// protocol sentinel, value is the block reward, no nonce consumed);
    /// every other transaction needs an existing funded sender, an exact
    /// nonce match, and a valid signature whose key derives the sender.
    pub fn apply_block(&mut self, block: &Block, config: &ChainConfig) -> Result<Vec<Hash>, ChainError> {
        let mut scratch = self.accounts.clone();
        Self::execute(&mut scratch, block, config)?;

        // All transactions validated; commit and write receipts.
        self.accounts = scratch;
        let block_receipts = self.receipts.entry(block.hash()).or_default();
        let mut txids = Vec::with_capacity(block.transactions.len());
        for (index, signed) in block.transactions.iter().enumerate() {
            let txid = signed.id();
            block_receipts.insert(
                txid,
                TransactionReceipt::new(
                    txid,
                    index as u32,
                    block.hash(),
                    block.height(),
                    signed.tx.from,
                    signed.tx.to,
                    signed.tx.value,
                    true,
                ),
            );
            txids.push(txid);
        }
        Ok(txids)
    }

    /// Run a block's transactions against an account map, mutating it in
    /// place. Fails without partial application guarantees; callers pass a
    /// scratch copy.
    fn execute(
        accounts: &mut HashMap<Address, Account>,
        block: &Block,
        config: &ChainConfig,
    ) -> Result<(), ChainError> {
        let hash = block.hash();

        let Some((first, rest)) = block.transactions.split_first() else {
            return Err(ChainError::invalid(hash, "block has no coinbase"));
        };

        if !first.is_coinbase(&config.protocol_node_id) {
            return Err(ChainError::invalid(hash, "first transaction is not a coinbase"));
        }
        if first.tx.value != config.block_reward {
            return Err(ChainError::invalid(
                hash,
                format!(
                    "coinbase value {} does not match block reward {}",
                    first.tx.value, config.block_reward
                ),
            ));
        }
        accounts
            .entry(first.tx.to)
            .or_default()
            .credit(first.tx.value);

        for signed in rest {
            if signed.is_coinbase(&config.protocol_node_id) {
                return Err(ChainError::invalid(hash, "coinbase after the first transaction"));
            }

            forkcast_crypto::verify_transaction(signed).map_err(|e| {
                ChainError::invalid(hash, format!("transaction signature: {}", e))
            })?;

            let sender = accounts.get_mut(&signed.tx.from).ok_or_else(|| {
                ChainError::invalid(hash, format!("unknown sender {:x}", signed.tx.from))
            })?;
            if sender.balance < signed.tx.value {
                return Err(ChainError::invalid(
                    hash,
                    format!(
                        "insufficient balance: {} < {}",
                        sender.balance, signed.tx.value
                    ),
                ));
            }
            if sender.nonce != signed.tx.nonce {
                return Err(ChainError::invalid(
                    hash,
                    format!("nonce mismatch: expected {}, got {}", sender.nonce, signed.tx.nonce),
                ));
            }

            sender.debit(signed.tx.value);
            sender.increment_nonce();
            accounts
                .entry(signed.tx.to)
                .or_default()
                .credit(signed.tx.value);
        }
        Ok(())
    }
}
