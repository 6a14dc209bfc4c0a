//! Forkcast Chain - execution layer and chain coordinator.
//!
//! This crate provides:
//! - `WorldState`: the account map and receipts index
//! - `Mempool`: pending transactions awaiting inclusion
//! - `Blockchain`: block/attestation ingestion, validate-and-apply, reorgs
//! - `block_builder`: block construction for slot proposers

pub mod block_builder;
pub mod blockchain;
pub mod mempool;
pub mod world_state;
pub mod error;

pub use block_builder::ProposalParams;
pub use blockchain::{unix_now_millis, unix_now_secs, BlockOutcome, Blockchain, ChainSummary};
pub use error::ChainError;
pub use mempool::Mempool;
pub use world_state::WorldState;
