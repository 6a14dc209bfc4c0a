//! Forkcast Consensus - the fork-choice core of the FORKCAST simulator.
//!
//! This crate provides:
//! - `BlockTree`: persistent tree of all observed blocks
//! - `BeaconState`: validator set, attestation pools, RANDAO, FFG state
//! - `lmd_ghost`: attested-weight decoration and head selection
//! - `casper`: FFG justification and finalization
//! - `randao`: proposer schedule derivation

pub mod beacon;
pub mod block_tree;
pub mod casper;
pub mod lmd_ghost;
pub mod randao;
pub mod error;

pub use beacon::BeaconState;
pub use block_tree::{BlockTree, NodeId, TreeNode, TreeStats, NULL_ROOT};
pub use error::ConsensusError;
