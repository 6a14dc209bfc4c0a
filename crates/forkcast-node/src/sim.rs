//! Simulation driver: spawns a fleet of validator nodes on the simulated
//! bus and runs them for a configured number of slots.
//!
//! Each node runs in its own task and exclusively owns its consensus core;
//! slot ticks, sync ticks, and inbound messages are serialized through one
//! `select!` loop per node.

use crate::config::SimConfig;
use crate::node::ValidatorNode;
use forkcast_chain::{unix_now_secs, ChainSummary};
use forkcast_crypto::{Keypair, RandaoKeypair};
use forkcast_network::{Envelope, NetworkConfig, SimNetwork};
use forkcast_types::{Address, GenesisConfig};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Final state of every node after the run.
#[derive(Debug)]
pub struct SimulationReport {
    pub summaries: Vec<(Address, ChainSummary)>,
}

impl SimulationReport {
    /// Whether every node ended on the same GHOST head.
    pub fn converged(&self) -> bool {
        let mut heads = self.summaries.iter().map(|(_, s)| s.head);
        let Some(first) = heads.next() else {
            return true;
        };
        heads.all(|h| h == first)
    }

    /// The highest finalized epoch across nodes.
    pub fn max_finalized_epoch(&self) -> u64 {
        self.summaries
            .iter()
            .map(|(_, s)| s.finalized.epoch)
            .max()
            .unwrap_or(0)
    }
}

/// Run a full simulation: genesis, `node_count` validators, `slots` slots.
pub async fn run(config: &SimConfig) -> anyhow::Result<SimulationReport> {
    config.validate()?;
    let chain_config = config.chain.clone();

    let genesis_time = unix_now_secs();
    let mut genesis = GenesisConfig::new(chain_config.clone(), genesis_time);
    let mut keys = Vec::with_capacity(chain_config.node_count);
    for i in 0..chain_config.node_count {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&(i as u64 + 1).to_le_bytes());
        let keypair = Keypair::from_seed(&seed);
        let randao = RandaoKeypair::from_seed(&seed)
            .map_err(|e| anyhow::anyhow!("RANDAO key derivation: {}", e))?;
        genesis.add_validator(
            keypair.address(),
            chain_config.max_effective_balance,
            randao.public_key(),
            keypair.public_key(),
        );
        keys.push((keypair, randao));
    }

    let network = SimNetwork::new(NetworkConfig {
        min_delay_ms: chain_config.min_network_delay_ms,
        max_delay_ms: chain_config.max_network_delay_ms,
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(keys.len());
    for (keypair, randao) in keys {
        let (handle, inbox) = network.join(keypair.address());
        let node = ValidatorNode::new(genesis.clone(), keypair, randao, handle);
        handles.push(tokio::spawn(node_loop(
            node,
            inbox,
            chain_config.clone(),
            shutdown_rx.clone(),
        )));
    }

    info!(
        nodes = chain_config.node_count,
        slots = config.slots,
        "simulation started"
    );
    let run_secs = config.slots * chain_config.seconds_per_slot;
    tokio::time::sleep(Duration::from_secs(run_secs + 1)).await;
    shutdown_tx.send(true)?;

    let mut summaries = Vec::new();
    for handle in handles {
        summaries.push(handle.await?);
    }
    Ok(SimulationReport { summaries })
}

/// Per-node event loop: one task, one consensus core, serialized events.
async fn node_loop(
    mut node: ValidatorNode,
    mut inbox: mpsc::Receiver<Envelope>,
    config: forkcast_types::ChainConfig,
    mut shutdown: watch::Receiver<bool>,
) -> (Address, ChainSummary) {
    let slot_start =
        tokio::time::Instant::now() + Duration::from_millis(config.proposer_buffer_ms);
    let mut slot_timer =
        tokio::time::interval_at(slot_start, Duration::from_secs(config.seconds_per_slot));
    let mut sync_timer = tokio::time::interval(Duration::from_millis(config.sync_interval_ms));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            Some(envelope) = inbox.recv() => node.on_message(envelope),
            _ = slot_timer.tick() => node.on_slot_tick(),
            _ = sync_timer.tick() => node.on_sync_tick(),
        }
    }
    (node.address(), node.summary())
}
