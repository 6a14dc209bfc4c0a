//! Forkcast Network - simulated gossip bus with latency injection.
//!
//! Every node joins the bus under its address and receives an inbox channel.
//! Sends are delivered asynchronously after a uniformly random delay between
//! the configured bounds, so messages arrive in arbitrary order across
//! nodes, which is the condition the consensus core is built to tolerate.

use forkcast_types::{Address, Attestation, Block, Hash};
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Inbox depth per node.
const CHANNEL_CAPACITY: usize = 1024;

/// Network error
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Unknown peer: {0:x}")]
    UnknownPeer(Address),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// The five consensus wire messages.
#[derive(Debug, Clone)]
pub enum Message {
    /// A proposer's new block for a slot
    ProposerBlockBroadcast { block: Block, slot: u64 },
    /// A validator's vote
    Attestation { attestation: Attestation },
    /// Periodic head gossip
    LmdGhostBroadcast { ghost_head_hash: Hash },
    /// Direct request for the branch ending at a head
    ChainRequest { requested_head_hash: Hash },
    /// Direct reply: the branch, genesis-first (empty when unknown)
    ChainResponse {
        requested_head_hash: Hash,
        blocks: Vec<Block>,
    },
}

impl Message {
    /// Short tag for log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ProposerBlockBroadcast { .. } => "proposer_block_broadcast",
            Message::Attestation { .. } => "attestation",
            Message::LmdGhostBroadcast { .. } => "lmd_ghost_broadcast",
            Message::ChainRequest { .. } => "chain_request",
            Message::ChainResponse { .. } => "chain_response",
        }
    }
}

/// A message together with its sender.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: Address,
    pub message: Message,
}

/// Latency bounds for simulated delivery.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl NetworkConfig {
    /// Instant delivery; used by tests.
    pub fn instant() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

type PeerTable = Arc<RwLock<HashMap<Address, mpsc::Sender<Envelope>>>>;

/// The shared in-memory bus.
pub struct SimNetwork {
    config: NetworkConfig,
    peers: PeerTable,
}

impl SimNetwork {
    /// Create an empty bus.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            peers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Join the bus under `address`. Returns the node's handle for sending
    /// and its inbox receiver.
    pub fn join(&self, address: Address) -> (NetworkHandle, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.peers.write().insert(address, tx);
        let handle = NetworkHandle {
            local: address,
            config: self.config,
            peers: Arc::clone(&self.peers),
        };
        (handle, rx)
    }

    /// Addresses currently on the bus.
    pub fn addresses(&self) -> Vec<Address> {
        self.peers.read().keys().copied().collect()
    }
}

/// A node's sending endpoint.
#[derive(Clone)]
pub struct NetworkHandle {
    local: Address,
    config: NetworkConfig,
    peers: PeerTable,
}

impl NetworkHandle {
    /// This node's address.
    pub fn local_address(&self) -> Address {
        self.local
    }

    /// All other nodes on the bus.
    pub fn peers(&self) -> Vec<Address> {
        self.peers
            .read()
            .keys()
            .copied()
            .filter(|a| *a != self.local)
            .collect()
    }

    /// Send a message to every other node, each copy with its own delay.
    pub fn broadcast(&self, message: Message) {
        for peer in self.peers() {
            // Best effort: a departed peer just drops the copy.
            let _ = self.send(peer, message.clone());
        }
    }

    /// Send a message to one node after a simulated delay.
    pub fn send(&self, to: Address, message: Message) -> Result<(), NetworkError> {
        let tx = self
            .peers
            .read()
            .get(&to)
            .cloned()
            .ok_or(NetworkError::UnknownPeer(to))?;

        let envelope = Envelope {
            from: self.local,
            message,
        };
        let delay = self.sample_delay();
        debug!(
            from = %envelope.from.short(),
            to = %to.short(),
            kind = envelope.message.kind(),
            delay_ms = delay.as_millis() as u64,
            "message queued"
        );

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(envelope).await;
        });
        Ok(())
    }

    fn sample_delay(&self) -> Duration {
        if self.config.max_delay_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(self.config.min_delay_ms..=self.config.max_delay_ms);
        Duration::from_millis(ms)
    }
}
