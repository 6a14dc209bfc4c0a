//! Forkcast Types - Core type definitions for the FORKCAST consensus simulator.
//!
//! This crate provides the fundamental types used throughout the simulator:
//! - Addresses (20-byte, Bech32m encoded)
//! - Hashes (32-byte, blake3 digests)
//! - Blocks, Transactions, Receipts
//! - Attestations and FFG checkpoints
//! - Accounts, Validators, Signatures
//! - Genesis and Chain configuration

pub mod address;
pub mod hash;
pub mod block;
pub mod transaction;
pub mod receipt;
pub mod account;
pub mod attestation;
pub mod validator;
pub mod signature;
pub mod genesis;
pub mod chain_config;
pub mod error;

mod serialization;

pub use address::Address;
pub use hash::Hash;
pub use block::{Block, BlockHeader};
pub use transaction::{SignedTransaction, Transaction};
pub use receipt::TransactionReceipt;
pub use account::Account;
pub use attestation::{Attestation, Checkpoint};
pub use validator::{Validator, ValidatorSet};
pub use signature::{BlsPublicKey, BlsSignature, Ed25519PublicKey, Ed25519Signature};
pub use genesis::{GenesisAlloc, GenesisConfig, GenesisValidator};
pub use chain_config::ChainConfig;
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Account, Address, Attestation, Block, BlockHeader, BlsPublicKey, BlsSignature,
        ChainConfig, Checkpoint, Ed25519PublicKey, Ed25519Signature, GenesisConfig, Hash,
        SignedTransaction, Transaction, TransactionReceipt, TypesError, Validator, ValidatorSet,
    };
}
