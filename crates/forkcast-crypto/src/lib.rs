//! Forkcast Crypto - Cryptographic primitives for the FORKCAST simulator.
//!
//! This crate provides:
//! - Ed25519 signatures (transaction signing)
//! - BLS12-381 signatures (RANDAO reveals)

pub mod ed25519;
pub mod randao;
pub mod error;

pub use ed25519::{verify as ed25519_verify, verify_transaction, Keypair};
pub use error::CryptoError;
pub use randao::{verify_reveal, RandaoKeypair};
