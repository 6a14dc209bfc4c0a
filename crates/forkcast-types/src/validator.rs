//! Validator registry.
//!
//! The active set is an ordered list; ordering matters because proposer
//! selection indexes into it.

use crate::address::Address;
use crate::signature::{BlsPublicKey, Ed25519PublicKey};
use std::fmt;

/// A staked validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    /// Node address (also the reward recipient)
    pub address: Address,
    /// Stake in whole ETH; used as vote weight in fork choice
    pub staked_eth: u64,
    /// BLS public key for RANDAO reveals
    pub bls_public_key: BlsPublicKey,
    /// Ed25519 public key for transaction signing
    pub public_key: Ed25519PublicKey,
}

impl Validator {
    /// Create a new validator.
    pub fn new(address: Address, staked_eth: u64) -> Self {
        Self {
            address,
            staked_eth,
            bls_public_key: BlsPublicKey::default(),
            public_key: Ed25519PublicKey::default(),
        }
    }

    /// Attach public keys.
    pub fn with_keys(mut self, bls: BlsPublicKey, ed25519: Ed25519PublicKey) -> Self {
        self.bls_public_key = bls;
        self.public_key = ed25519;
        self
    }

    /// Stake capped at the effective-balance ceiling.
    pub fn effective_stake(&self, max_effective_balance: u64) -> u64 {
        self.staked_eth.min(max_effective_balance)
    }
}

/// Ordered set of active validators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an ordered list.
    pub fn from_validators(validators: Vec<Validator>) -> Self {
        Self { validators }
    }

    /// Append a validator (keeps insertion order).
    pub fn push(&mut self, validator: Validator) {
        self.validators.push(validator);
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Ordered view of the set.
    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }

    /// Validator at a selection index.
    pub fn at(&self, index: usize) -> Option<&Validator> {
        self.validators.get(index)
    }

    /// Lookup by address.
    pub fn get(&self, address: &Address) -> Option<&Validator> {
        self.validators.iter().find(|v| v.address == *address)
    }

    /// Check membership.
    pub fn contains(&self, address: &Address) -> bool {
        self.get(address).is_some()
    }

    /// Stake of a validator, zero for non-members.
    pub fn stake_of(&self, address: &Address) -> u64 {
        self.get(address).map(|v| v.staked_eth).unwrap_or(0)
    }

    /// Stake of a validator capped at the effective-balance ceiling.
    pub fn effective_stake_of(&self, address: &Address, max_effective_balance: u64) -> u64 {
        self.get(address)
            .map(|v| v.effective_stake(max_effective_balance))
            .unwrap_or(0)
    }

    /// Sum of all stakes.
    pub fn total_stake(&self) -> u64 {
        self.validators.iter().map(|v| v.staked_eth).sum()
    }

    /// FFG justification threshold: `ceil(2 * |validators| / 3)` voters.
    pub fn ffg_threshold(&self) -> usize {
        let n = self.validators.len();
        (2 * n).div_ceil(3)
    }
}

impl fmt::Display for ValidatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ValidatorSet {{ count: {}, total_stake: {} }}",
            self.len(),
            self.total_stake()
        )
    }
}
