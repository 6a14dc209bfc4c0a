//! Block construction for the slot proposer.
//!
//! A proposed block carries, in order: the coinbase paying the proposer,
//! a slice of the mempool, one payment per peer, and an optional
//! distribution returning the proposer's remaining balance to the
//! application contract. Attestations come from the beacon pool, filtered
//! by the processed set; the RANDAO reveal signs the current epoch.

use crate::blockchain::Blockchain;
use crate::error::ChainError;
use forkcast_crypto::{Keypair, RandaoKeypair};
use forkcast_types::{Address, Block, BlockHeader, SignedTransaction, Transaction};
use std::collections::HashMap;

/// Inputs for proposing a block at a slot.
pub struct ProposalParams<'a> {
    /// The proposer's transaction-signing key
    pub proposer: &'a Keypair,
    /// The proposer's RANDAO key
    pub randao: &'a RandaoKeypair,
    /// Slot being proposed
    pub slot: u64,
    /// Known peers, each receiving one payment
    pub peers: &'a [Address],
    /// Block timestamp (seconds)
    pub timestamp_secs: u64,
    /// Transaction timestamp base (milliseconds)
    pub timestamp_millis: u64,
}

/// Assemble a block on the canonical tip. The block is returned sealed but
/// not inserted; the caller broadcasts it and feeds it back through
/// [`Blockchain::add_block`].
pub fn build_block(chain: &Blockchain, params: ProposalParams<'_>) -> Result<Block, ChainError> {
    let config = chain.config().clone();
    let parent_hash = chain.ghost_head_hash();
    let parent_id = chain
        .tree()
        .get(&parent_hash)
        .expect("ghost head is in the tree");
    let parent = chain.tree().node(parent_id);
    let parent_height = parent.height().unwrap_or(0);
    let parent_slot = parent.slot().unwrap_or(0);

    if params.slot <= parent_slot {
        return Err(ChainError::invalid(
            parent_hash,
            format!("cannot propose slot {} on top of slot {}", params.slot, parent_slot),
        ));
    }

    let proposer = params.proposer.address();
    let mut transactions = Vec::new();

    // Coinbase first; it funds the proposer within this very block.
    transactions.push(SignedTransaction::coinbase(Transaction::coinbase(
        config.protocol_node_id,
        proposer,
        config.block_reward,
        params.timestamp_millis,
    )));

    // Mempool slice, leaving room for the peer payments and distribution.
    // Entries that no longer fit the current state (stale nonce after a
    // reorg, drained balance) are passed over instead of invalidating the
    // whole block.
    let budget = config
        .max_block_transactions
        .saturating_sub(1)
        .saturating_sub(params.peers.len())
        .saturating_sub(1);

    let mut scratch: HashMap<Address, (u64, u64)> = HashMap::new(); // (nonce, balance)
    let account = |scratch: &mut HashMap<Address, (u64, u64)>, address: Address| {
        *scratch
            .entry(address)
            .or_insert_with(|| (chain.world().nonce(&address), chain.world().balance(&address)))
    };
    // The coinbase funds the proposer ahead of its own transfers.
    account(&mut scratch, proposer);
    scratch.get_mut(&proposer).expect("seeded above").1 += config.block_reward;

    let mut own_pending = 0u64;
    let mut own_outflow = 0u64;
    for signed in chain.mempool().peek(budget) {
        let (nonce, balance) = account(&mut scratch, signed.tx.from);
        if signed.tx.nonce != nonce || balance < signed.tx.value {
            continue;
        }
        if signed.tx.from == proposer {
            own_pending += 1;
            own_outflow += signed.tx.value;
        }
        {
            let entry = scratch.get_mut(&signed.tx.from).expect("seeded above");
            entry.0 += 1;
            entry.1 -= signed.tx.value;
        }
        account(&mut scratch, signed.tx.to);
        scratch.get_mut(&signed.tx.to).expect("seeded above").1 += signed.tx.value;
        transactions.push(signed);
    }

    // Peer payments: nonces continue after the proposer's own pending txs.
    let mut nonce = chain.world().nonce(&proposer) + own_pending;
    let mut spendable = chain
        .world()
        .balance(&proposer)
        .saturating_add(config.block_reward)
        .saturating_sub(own_outflow);

    for (i, peer) in params.peers.iter().enumerate() {
        if spendable < config.peer_payment_amount {
            break;
        }
        let tx = Transaction::new(
            proposer,
            *peer,
            config.peer_payment_amount,
            nonce,
            params.timestamp_millis + 1 + i as u64,
        );
        transactions.push(params.proposer.sign_transaction(tx));
        nonce += 1;
        spendable -= config.peer_payment_amount;
    }

    // Distribution: return whatever is left to the application contract.
    if let Some(contract) = config.app_contract {
        if spendable > 0 {
            let tx = Transaction::new(
                proposer,
                contract,
                spendable,
                nonce,
                params.timestamp_millis + 1 + params.peers.len() as u64,
            );
            transactions.push(params.proposer.sign_transaction(tx));
        }
    }

    let attestations = chain
        .beacon()
        .unprocessed_pool(config.max_block_attestations);

    let epoch = config.epoch_of(params.slot);
    let randao_reveal = params.randao.reveal(epoch);

    let header = BlockHeader::new(
        parent_height + 1,
        params.slot,
        parent_hash,
        Block::transactions_root(&transactions),
        params.timestamp_secs,
    );
    Ok(Block::new(header, transactions, attestations, randao_reveal))
}
