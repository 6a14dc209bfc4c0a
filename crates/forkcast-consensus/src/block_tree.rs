//! Persistent tree of all observed blocks.
//!
//! Nodes live in an arena and link to each other by index, with a synthetic
//! null root at index 0 parenting every height-0 block. `nodes_by_hash` is
//! the authoritative index; the cached `ghost_head` identifies the canonical
//! tip. Sibling traversal order during fork choice is the insertion order of
//! the `children` arrays.

use crate::error::ConsensusError;
use forkcast_types::{Block, Hash};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Arena index of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// The synthetic parent of all genesis blocks.
pub const NULL_ROOT: NodeId = NodeId(0);

/// One node per observed block, plus the null root.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// The block itself; `None` only for the null root
    pub block: Option<Block>,
    /// Block hash (`Hash::ZERO` for the null root)
    pub hash: Hash,
    /// Parent link; `None` only for the null root
    pub parent: Option<NodeId>,
    /// Children in insertion order
    pub children: Vec<NodeId>,
    /// Sum of effective stakes of latest attestations covering this subtree
    pub attested_eth: u64,
    /// Set when validate-and-apply failed for this block
    pub invalid: bool,
}

impl TreeNode {
    /// Check whether this is the synthetic root.
    pub fn is_null_root(&self) -> bool {
        self.block.is_none()
    }

    /// Height of the node's block (null root has none).
    pub fn height(&self) -> Option<u64> {
        self.block.as_ref().map(|b| b.height())
    }

    /// Slot of the node's block (null root has none).
    pub fn slot(&self) -> Option<u64> {
        self.block.as_ref().map(|b| b.slot())
    }
}

/// Aggregate counters for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of real blocks (null root excluded)
    pub total_blocks: usize,
    /// Number of leaves
    pub leaves: usize,
    /// Number of forks (`leaves - 1`, zero for a linear chain)
    pub forks: usize,
    /// Number of nodes marked invalid
    pub invalid: usize,
}

/// The forest of observed blocks under the null root.
pub struct BlockTree {
    nodes: Vec<TreeNode>,
    nodes_by_hash: HashMap<Hash, NodeId>,
    leaves: HashSet<NodeId>,
    ghost_head: NodeId,
}

impl BlockTree {
    /// Create an empty tree containing only the null root. The ghost head
    /// points at the null root until the first head is installed.
    pub fn new() -> Self {
        let null_root = TreeNode {
            block: None,
            hash: Hash::ZERO,
            parent: None,
            children: Vec::new(),
            attested_eth: 0,
            invalid: false,
        };
        Self {
            nodes: vec![null_root],
            nodes_by_hash: HashMap::new(),
            leaves: HashSet::new(),
            ghost_head: NULL_ROOT,
        }
    }

    /// Number of real blocks in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// True when no block has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Insert a block. Rejects duplicates; fails when the parent is not
    /// present (the caller may buffer and retry). Height-0 blocks attach to
    /// the null root.
    pub fn add_block(&mut self, block: Block) -> Result<NodeId, ConsensusError> {
        let hash = block.hash();
        if self.nodes_by_hash.contains_key(&hash) {
            return Err(ConsensusError::DuplicateBlock(hash));
        }

        let parent = if block.height() == 0 {
            NULL_ROOT
        } else {
            *self
                .nodes_by_hash
                .get(&block.header.previous_header_hash)
                .ok_or(ConsensusError::UnknownParent(
                    block.header.previous_header_hash,
                ))?
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            block: Some(block),
            hash,
            parent: Some(parent),
            children: Vec::new(),
            attested_eth: 0,
            invalid: false,
        });
        self.nodes[parent.0].children.push(id);
        self.nodes_by_hash.insert(hash, id);

        self.leaves.remove(&parent);
        self.leaves.insert(id);

        Ok(id)
    }

    /// Lookup a node id by block hash.
    pub fn get(&self, hash: &Hash) -> Option<NodeId> {
        self.nodes_by_hash.get(hash).copied()
    }

    /// Check membership by hash.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.nodes_by_hash.contains_key(hash)
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    /// Parent of a node (`None` for the null root).
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Children of a node in insertion order.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Current leaf set.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.leaves.iter().copied()
    }

    /// Walk parent links from `from` to the null root and return the blocks
    /// in genesis-first order. Empty when the hash is unknown.
    pub fn chain_from(&self, from: &Hash) -> Vec<Block> {
        let Some(mut id) = self.get(from) else {
            return Vec::new();
        };

        let mut chain = Vec::new();
        while id != NULL_ROOT {
            let node = &self.nodes[id.0];
            chain.push(node.block.clone().expect("non-root nodes carry a block"));
            id = node.parent.expect("non-root nodes have a parent");
        }
        chain.reverse();
        chain
    }

    /// The canonical chain: genesis-first walk from the cached ghost head.
    pub fn canonical_chain(&self) -> Vec<Block> {
        if self.ghost_head == NULL_ROOT {
            return Vec::new();
        }
        self.chain_from(&self.nodes[self.ghost_head.0].hash)
    }

    /// The cached canonical tip.
    pub fn ghost_head(&self) -> NodeId {
        self.ghost_head
    }

    /// Hash of the canonical tip (`None` before any head was installed).
    pub fn ghost_head_hash(&self) -> Option<Hash> {
        if self.ghost_head == NULL_ROOT {
            None
        } else {
            Some(self.nodes[self.ghost_head.0].hash)
        }
    }

    /// Install the canonical tip by hash. Fails for unknown hashes; the null
    /// root has no hash entry and is therefore rejected too.
    pub fn set_ghost_head(&mut self, hash: &Hash) -> Result<(), ConsensusError> {
        let id = self.get(hash).ok_or(ConsensusError::UnknownBlock(*hash))?;
        self.ghost_head = id;
        Ok(())
    }

    pub(crate) fn set_ghost_head_id(&mut self, id: NodeId) -> Result<(), ConsensusError> {
        if id == NULL_ROOT {
            return Err(ConsensusError::NullRootHead);
        }
        self.ghost_head = id;
        Ok(())
    }

    /// Mark a node invalid and zero its attested weight. Returns the weight
    /// the node's subtree had accumulated so fork choice can retract it from
    /// the ancestors (see `lmd_ghost::mark_invalid`). The null root and
    /// already-invalid nodes are left untouched (returns zero).
    pub fn mark_invalid(&mut self, id: NodeId) -> u64 {
        if id == NULL_ROOT {
            return 0;
        }
        let node = &mut self.nodes[id.0];
        if node.invalid {
            return 0;
        }
        node.invalid = true;
        std::mem::take(&mut node.attested_eth)
    }

    /// Check whether `ancestor` is on the parent path of `descendant`
    /// (a node is its own ancestor).
    pub fn is_ancestor(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        let mut current = Some(descendant);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    /// Nodes strictly after `ancestor` down to `descendant` (inclusive), in
    /// chain order. `None` when `ancestor` is not on the path.
    pub fn path_between(&self, ancestor: NodeId, descendant: NodeId) -> Option<Vec<NodeId>> {
        let mut path = Vec::new();
        let mut current = descendant;
        while current != ancestor {
            path.push(current);
            current = self.nodes[current.0].parent?;
        }
        path.reverse();
        Some(path)
    }

    /// Aggregate counters.
    pub fn stats(&self) -> TreeStats {
        let leaves = self.leaves.len();
        TreeStats {
            total_blocks: self.len(),
            leaves,
            forks: leaves.saturating_sub(1),
            invalid: self.nodes.iter().filter(|n| n.invalid).count(),
        }
    }
}

impl Default for BlockTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BlockTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BlockTree {{ blocks: {}, leaves: {}, head: {:?} }}",
            self.len(),
            self.leaves.len(),
            self.ghost_head_hash()
        )
    }
}
