// Copyright 2024 The Tempo Developers
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! The branching candidate tree: putative headers not yet (or no longer)
//! part of the committed chain, keyed by hash.
//!
//! Mirrors `hornet::data::HeaderTimechain`'s internal `HashedTree<NodeData>`
//! (see `examples/original_source/data/header_timechain.h` and
//! `data/hashed_tree.h`), re-expressed as a plain `HashMap<Hash, Node>` with
//! upward-only parent links stored as hashes rather than pointers/iterators -
//! Rust's ownership model makes a pointer-stable intrusive tree awkward, and
//! every operation this crate needs (find by hash, walk to root, prune by
//! `root_height`) is expressible as hash lookups instead.

use std::collections::HashMap;

use crate::blocks::HeaderContext;
use crate::hash::Hash;

/// One candidate header: its full accounting context, an upward link to its
/// parent (`None` only for a node whose parent is the committed chain, not
/// another tree node), and the height of the fork root that started this
/// branch - used to prioritize pruning without walking every branch.
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub parent: Option<Hash>,
    pub context: HeaderContext,
    pub root_height: u64,
}

#[derive(Debug, Default)]
pub struct HeaderTree {
    nodes: HashMap<Hash, TreeNode>,
}

impl HeaderTree {
    pub fn new() -> Self {
        HeaderTree::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&TreeNode> {
        self.nodes.get(hash)
    }

    pub fn insert(&mut self, hash: Hash, node: TreeNode) {
        self.nodes.insert(hash, node);
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<TreeNode> {
        self.nodes.remove(hash)
    }

    /// Walks from `tip_hash` up to (and including) the root of its branch,
    /// returning the path ordered root-first. Panics if `tip_hash` is not a
    /// known tree node - callers only invoke this on a hash they just looked
    /// up.
    pub fn path_to_root(&self, tip_hash: Hash) -> Vec<Hash> {
        let mut path = vec![tip_hash];
        let mut current = tip_hash;
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Removes every node whose branch `root_height` is strictly below
    /// `cutoff`. Order-independent: `root_height` is precomputed metadata on
    /// each node, so a single pass suffices (no need to walk newest-to-oldest
    /// as the reference implementation does to avoid recomputation).
    pub fn prune_below(&mut self, cutoff: u64) {
        self.nodes.retain(|_, node| node.root_height >= cutoff);
    }

    /// The minimum `root_height` among all surviving nodes, or `None` if the
    /// tree is empty.
    pub fn min_root_height(&self) -> Option<u64> {
        self.nodes.values().map(|n| n.root_height).min()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::BlockHeader;
    use crate::proof_of_work::CompactTarget;

    fn header(prev: Hash, nonce: u32) -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: prev,
            merkle_root: Hash::ZERO,
            timestamp: 1_000 + nonce,
            bits: CompactTarget::from_u32(0x1d00ffff),
            nonce,
        }
    }

    #[test]
    fn path_to_root_is_root_first() {
        let mut tree = HeaderTree::new();
        let genesis = HeaderContext::genesis(header(Hash::ZERO, 0));
        let a = genesis.extend(header(genesis.hash, 1)).unwrap();
        let b = a.extend(header(a.hash, 2)).unwrap();

        tree.insert(a.hash, TreeNode { parent: None, context: a, root_height: 1 });
        tree.insert(b.hash, TreeNode { parent: Some(a.hash), context: b, root_height: 1 });

        let path = tree.path_to_root(b.hash);
        assert_eq!(path, vec![a.hash, b.hash]);
    }

    #[test]
    fn prune_below_removes_only_stale_branches() {
        let mut tree = HeaderTree::new();
        let genesis = HeaderContext::genesis(header(Hash::ZERO, 0));
        let stale = genesis.extend(header(genesis.hash, 1)).unwrap();
        let fresh = genesis.extend(header(genesis.hash, 2)).unwrap();

        tree.insert(stale.hash, TreeNode { parent: None, context: stale, root_height: 1 });
        tree.insert(fresh.hash, TreeNode { parent: None, context: fresh, root_height: 10 });

        tree.prune_below(5);
        assert!(!tree.contains(&stale.hash));
        assert!(tree.contains(&fresh.hash));
    }
}
