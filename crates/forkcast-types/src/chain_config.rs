use crate::address::Address;
use crate::hash::Hash;
use serde::{Deserialize, Serialize};

/// Protocol-level configuration shared by every node in a simulation.
///
/// All nodes must agree on these values; they feed block construction,
/// validation, slot arithmetic, and fork choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Coinbase amount paid to the proposer (whole ETH)
    pub block_reward: u64,
    /// Size of the validator set at genesis
    pub node_count: usize,
    /// Lower bound of simulated message latency
    pub min_network_delay_ms: u64,
    /// Upper bound of simulated message latency
    pub max_network_delay_ms: u64,
    /// Wall-clock seconds per slot
    pub seconds_per_slot: u64,
    /// Slots per epoch
    pub slots_per_epoch: u64,
    /// Grace period before the next slot is proposed
    pub proposer_buffer_ms: u64,
    /// Period of ghost-head gossip broadcasts
    pub sync_interval_ms: u64,
    /// Per-validator stake cap used as fork-choice weight
    pub max_effective_balance: u64,
    /// Upper bound on transactions per block
    pub max_block_transactions: usize,
    /// Upper bound on attestations included per block
    pub max_block_attestations: usize,
    /// Previous-hash reference for height-0 blocks
    pub genesis_prev_hash: Hash,
    /// Seed value for the epoch-0 RANDAO mix
    pub genesis_randao_mix: Hash,
    /// Seed reveal folded into the epoch-0 mix
    pub genesis_randao_reveal: Hash,
    /// Sentinel sender address for coinbase transactions
    pub protocol_node_id: Address,
    /// Value of the per-peer payment in proposed blocks
    pub peer_payment_amount: u64,
    /// Application contract receiving the proposer's distribution payment
    pub app_contract: Option<Address>,
    /// Bound on head-reselection retries during reorg handling
    pub reorg_retry_limit: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            block_reward: 10,
            node_count: 5,
            min_network_delay_ms: 50,
            max_network_delay_ms: 300,
            seconds_per_slot: 12,
            slots_per_epoch: 4,
            proposer_buffer_ms: 500,
            sync_interval_ms: 2000,
            max_effective_balance: 32,
            max_block_transactions: 16,
            max_block_attestations: 128,
            genesis_prev_hash: Hash::ZERO,
            genesis_randao_mix: Hash::ZERO,
            genesis_randao_reveal: Hash::ZERO,
            protocol_node_id: Address::PROTOCOL,
            peer_payment_amount: 1,
            app_contract: None,
            reorg_retry_limit: 10,
        }
    }
}

impl ChainConfig {
    /// Epoch a slot falls into.
    pub fn epoch_of(&self, slot: u64) -> u64 {
        slot / self.slots_per_epoch
    }

    /// First slot of an epoch (the checkpoint slot).
    pub fn checkpoint_slot(&self, epoch: u64) -> u64 {
        epoch * self.slots_per_epoch
    }

    /// Whether a slot is the first of its epoch.
    pub fn is_first_slot_of_epoch(&self, slot: u64) -> bool {
        slot % self.slots_per_epoch == 0
    }

    /// Sanity-check the parameter set.
    pub fn validate(&self) -> Result<(), String> {
        if self.seconds_per_slot == 0 {
            return Err("seconds_per_slot cannot be 0".to_string());
        }
        if self.slots_per_epoch == 0 {
            return Err("slots_per_epoch cannot be 0".to_string());
        }
        if self.node_count == 0 {
            return Err("node_count cannot be 0".to_string());
        }
        if self.min_network_delay_ms > self.max_network_delay_ms {
            return Err("min_network_delay_ms exceeds max_network_delay_ms".to_string());
        }
        // Every block needs room for coinbase + one payment per peer.
        if self.max_block_transactions < self.node_count + 1 {
            return Err(format!(
                "max_block_transactions must be at least node_count + 1 ({})",
                self.node_count + 1
            ));
        }
        if self.block_reward == 0 {
            return Err("block_reward cannot be 0".to_string());
        }
        Ok(())
    }
}
