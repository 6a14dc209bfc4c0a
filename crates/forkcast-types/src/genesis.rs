use crate::address::Address;
use crate::block::{Block, BlockHeader};
use crate::chain_config::ChainConfig;
use crate::signature::{BlsPublicKey, BlsSignature, Ed25519PublicKey};
use crate::validator::{Validator, ValidatorSet};

/// Genesis configuration: chain parameters, pre-funded accounts, and the
/// validator registry. Every node derives the identical genesis block from
/// it, so all fields must be deterministic.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct GenesisConfig {
    /// Chain configuration
    pub chain_config: ChainConfig,
    /// Genesis timestamp (seconds); also the slot-0 reference time
    pub timestamp: u64,
    /// Pre-funded accounts
    pub alloc: Vec<GenesisAlloc>,
    /// Initial validators
    pub validators: Vec<GenesisValidator>,
}

/// Genesis allocation entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisAlloc {
    pub address: Address,
    pub balance: u64,
}

/// Genesis validator entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisValidator {
    pub address: Address,
    pub stake: u64,
    pub bls_public_key: BlsPublicKey,
    pub public_key: Ed25519PublicKey,
}

impl GenesisConfig {
    /// Create a new genesis config with the given chain parameters.
    pub fn new(chain_config: ChainConfig, timestamp: u64) -> Self {
        Self {
            chain_config,
            timestamp,
            alloc: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Add a pre-funded account.
    pub fn add_alloc(&mut self, address: Address, balance: u64) {
        self.alloc.push(GenesisAlloc { address, balance });
    }

    /// Add a validator.
    pub fn add_validator(
        &mut self,
        address: Address,
        stake: u64,
        bls_pk: BlsPublicKey,
        ed25519_pk: Ed25519PublicKey,
    ) {
        self.validators.push(GenesisValidator {
            address,
            stake,
            bls_public_key: bls_pk,
            public_key: ed25519_pk,
        });
    }

    /// The ordered active set derived from the registry.
    pub fn validator_set(&self) -> ValidatorSet {
        let validators = self
            .validators
            .iter()
            .map(|v| {
                Validator::new(v.address, v.stake)
                    .with_keys(v.bls_public_key.clone(), v.public_key)
            })
            .collect();
        ValidatorSet::from_validators(validators)
    }

    /// Build the deterministic genesis block: height 0, slot 0, no payload,
    /// previous hash taken from the chain config.
    pub fn genesis_block(&self) -> Block {
        let header = BlockHeader::new(
            0,
            0,
            self.chain_config.genesis_prev_hash,
            Block::transactions_root(&[]),
            self.timestamp,
        );
        Block::new(header, vec![], vec![], BlsSignature::default())
    }
}
