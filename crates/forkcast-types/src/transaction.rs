use crate::address::Address;
use crate::hash::Hash;
use crate::signature::{Ed25519PublicKey, Ed25519Signature};
use std::fmt;

/// Unsigned transaction data (account model).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Transaction {
    /// Sender address
    pub from: Address,
    /// Recipient address
    pub to: Address,
    /// Value in whole ETH
    pub value: u64,
    /// Sender's nonce (increments with each TX; coinbase consumes none)
    pub nonce: u64,
    /// Unix timestamp (milliseconds)
    pub timestamp: u64,
}

impl Transaction {
    /// Create a new transfer transaction
    pub fn new(from: Address, to: Address, value: u64, nonce: u64, timestamp: u64) -> Self {
        Self {
            from,
            to,
            value,
            nonce,
            timestamp,
        }
    }

    /// Create the protocol-generated coinbase transaction paying `proposer`
    /// the block reward. Coinbase consumes no nonce and carries no signature.
    pub fn coinbase(protocol_id: Address, proposer: Address, reward: u64, timestamp: u64) -> Self {
        Self {
            from: protocol_id,
            to: proposer,
            value: reward,
            nonce: 0,
            timestamp,
        }
    }

    /// Transaction id: digest of `{ from, to, value, nonce, timestamp }`
    /// in declared field order.
    pub fn id(&self) -> Hash {
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(self.from.as_bytes());
        data.extend_from_slice(self.to.as_bytes());
        data.extend_from_slice(&self.value.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        Hash::compute(&data)
    }

    /// The hash a sender signs (the txid).
    pub fn signing_hash(&self) -> Hash {
        self.id()
    }
}

/// Transaction with signature attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signature: Ed25519Signature,
    /// Sender public key (included for verification)
    pub public_key: Ed25519PublicKey,
}

impl SignedTransaction {
    /// Create a new signed transaction
    pub fn new(tx: Transaction, signature: Ed25519Signature, public_key: Ed25519PublicKey) -> Self {
        Self {
            tx,
            signature,
            public_key,
        }
    }

    /// Wrap a coinbase transaction. Coinbase carries a zero signature.
    pub fn coinbase(tx: Transaction) -> Self {
        Self {
            tx,
            signature: Ed25519Signature::default(),
            public_key: Ed25519PublicKey::default(),
        }
    }

    /// Transaction id (signature is not part of the id)
    pub fn id(&self) -> Hash {
        self.tx.id()
    }

    /// Check whether this is the protocol coinbase under the given sentinel.
    pub fn is_coinbase(&self, protocol_id: &Address) -> bool {
        self.tx.from == *protocol_id
    }

    /// Address derived from the attached public key.
    pub fn sender(&self) -> Address {
        self.public_key.to_address()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction {{ from: {}, to: {}, value: {}, nonce: {} }}",
            self.from.short(),
            self.to.short(),
            self.value,
            self.nonce
        )
    }
}
