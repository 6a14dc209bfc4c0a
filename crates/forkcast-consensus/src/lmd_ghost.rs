//! LMD-GHOST fork choice.
//!
//! Decorates the block tree with attested weight and selects the canonical
//! head by greedily descending into the heaviest valid subtree. Weight walks
//! stop at invalid nodes, so an invalid subtree never propagates weight to
//! its ancestors; `mark_invalid` retracts whatever the subtree had already
//! contributed.
//!
//! Within one update the sequence is: latest-attestation writes, weight
//! decoration, head recomputation. Callers must not interleave other
//! consensus mutations between these steps.

use crate::beacon::BeaconState;
use crate::block_tree::{BlockTree, NodeId, NULL_ROOT};
use forkcast_types::{Attestation, Hash};
use tracing::debug;

/// Walk from `start` to the null root, adding `stake` to every node on the
/// way. Stops when it meets an invalid node.
fn add_weight(tree: &mut BlockTree, start: NodeId, stake: u64) {
    let mut current = start;
    while current != NULL_ROOT {
        let node = tree.node_mut(current);
        if node.invalid {
            break;
        }
        node.attested_eth = node.attested_eth.saturating_add(stake);
        current = node.parent.expect("non-root nodes have a parent");
    }
}

/// Inverse of [`add_weight`].
fn sub_weight(tree: &mut BlockTree, start: NodeId, stake: u64) {
    let mut current = start;
    while current != NULL_ROOT {
        let node = tree.node_mut(current);
        if node.invalid {
            break;
        }
        node.attested_eth = node.attested_eth.saturating_sub(stake);
        current = node.parent.expect("non-root nodes have a parent");
    }
}

/// React to a validator's latest attestation moving from `old` to `new`.
/// Walks absent from the tree are skipped; the weight is applied later by
/// [`on_new_block`] when the attested block arrives.
pub fn on_latest_attest_change(
    tree: &mut BlockTree,
    old: Option<&Hash>,
    new: &Hash,
    stake: u64,
) {
    if old == Some(new) {
        return;
    }
    if let Some(old_hash) = old {
        if let Some(id) = tree.get(old_hash) {
            sub_weight(tree, id, stake);
        }
    }
    if let Some(id) = tree.get(new) {
        add_weight(tree, id, stake);
    }
}

/// Apply the pending weight of attestations that were observed before their
/// block arrived. Called once per newly inserted block.
pub fn on_new_block(tree: &mut BlockTree, state: &BeaconState, block_hash: &Hash) {
    let Some(id) = tree.get(block_hash) else {
        return;
    };
    let cap = state.config().max_effective_balance;
    let pending: u64 = state
        .latest_attestations()
        .values()
        .filter(|att| att.block_hash == *block_hash)
        .map(|att| state.validators().effective_stake_of(&att.validator, cap))
        .sum();
    if pending > 0 {
        add_weight(tree, id, pending);
    }
}

/// Apply a batch of latest-attestation replacements, then recompute and
/// install the ghost head. Returns the resulting head.
pub fn on_attestation_set_changed(
    tree: &mut BlockTree,
    state: &BeaconState,
    changes: &[(Option<Attestation>, Attestation)],
) -> NodeId {
    let cap = state.config().max_effective_balance;
    for (old, new) in changes {
        let stake = state.validators().effective_stake_of(&new.validator, cap);
        on_latest_attest_change(
            tree,
            old.as_ref().map(|a| &a.block_hash),
            &new.block_hash,
            stake,
        );
    }
    recompute_head(tree)
}

/// Greedy heaviest-subtree descent from the null root. At each step the
/// heaviest valid child is taken; a tie between two or more children halts
/// at their parent. A node without valid children is the head.
pub fn compute_ghost_head(tree: &BlockTree) -> NodeId {
    let mut current = NULL_ROOT;
    loop {
        let mut best: Option<NodeId> = None;
        let mut best_weight = 0u64;
        let mut tied = false;

        for &child in tree.children_of(current) {
            if tree.node(child).invalid {
                continue;
            }
            let weight = tree.node(child).attested_eth;
            match best {
                None => {
                    best = Some(child);
                    best_weight = weight;
                }
                Some(_) if weight > best_weight => {
                    best = Some(child);
                    best_weight = weight;
                    tied = false;
                }
                Some(_) if weight == best_weight => {
                    tied = true;
                }
                Some(_) => {}
            }
        }

        match best {
            None => return current,
            Some(_) if tied => return current,
            Some(child) => current = child,
        }
    }
}

/// Recompute the head and install it on the tree. A computed head equal to
/// the null root (no blocks yet, or a tie among genesis siblings) leaves the
/// cached head untouched.
pub fn recompute_head(tree: &mut BlockTree) -> NodeId {
    let head = compute_ghost_head(tree);
    if head != NULL_ROOT {
        let old = tree.ghost_head();
        if old != head {
            debug!(
                new_head = %tree.node(head).hash.short(),
                "fork choice selected a new head"
            );
        }
        tree.set_ghost_head_id(head)
            .expect("computed head is not the null root");
    }
    tree.ghost_head()
}

/// Mark a node invalid via [`BlockTree::mark_invalid`] and retract the
/// weight its subtree had propagated to its ancestors.
pub fn mark_invalid(tree: &mut BlockTree, id: NodeId) {
    let retracted = tree.mark_invalid(id);
    if retracted > 0 {
        if let Some(parent) = tree.parent_of(id) {
            sub_weight(tree, parent, retracted);
        }
    }
}
