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

//! The permanent, linear part of the timechain: headers that are no longer
//! contested by any competing branch, indexed by height for O(1) lookup.
//!
//! Mirrors `hornet::data::HeaderChain` (see
//! `examples/original_source/data/header_timechain.h`), re-expressed as a
//! plain indexed `Vec` rather than a templated ring buffer, since Rust's
//! ownership model makes the chain the sole owner of its `HeaderContext`s.

use std::collections::HashMap;

use crate::blocks::HeaderContext;
use crate::hash::Hash;

use super::error::ChainStorageError;

#[derive(Debug, Default)]
pub struct HeaderChain {
    headers: Vec<HeaderContext>,
    hash_index: HashMap<Hash, u64>,
}

impl HeaderChain {
    pub fn new() -> Self {
        HeaderChain::default()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn tip_height(&self) -> Option<u64> {
        self.headers.last().map(|h| h.height)
    }

    pub fn tip(&self) -> Option<&HeaderContext> {
        self.headers.last()
    }

    pub fn get(&self, height: u64) -> Option<&HeaderContext> {
        self.headers.get(height as usize)
    }

    pub fn hash_at(&self, height: u64) -> Option<Hash> {
        self.get(height).map(|h| h.hash)
    }

    /// The height of `hash`, if it names a header currently on the
    /// committed chain. Backed by a side index so header-sync's parent
    /// lookup stays O(1) instead of scanning the chain per batch.
    pub fn find_height(&self, hash: &Hash) -> Option<u64> {
        self.hash_index.get(hash).copied()
    }

    /// Appends `context` to the chain. The caller must ensure `context`
    /// extends the current tip (height = tip height + 1, or 0 for an empty
    /// chain).
    pub fn push(&mut self, context: HeaderContext) -> Result<(), ChainStorageError> {
        let expected_height = self.headers.len() as u64;
        if context.height != expected_height {
            return Err(ChainStorageError::NonContiguousHeight { height: context.height });
        }
        self.hash_index.insert(context.hash, context.height);
        self.headers.push(context);
        Ok(())
    }

    /// Truncates the chain to `length` headers, discarding everything at or
    /// above that height. Used when a heavier branch replaces the tail of
    /// the permanent chain during a reorg.
    pub fn truncate_length(&mut self, length: u64) {
        let length = (length as usize).min(self.headers.len());
        for context in self.headers.drain(length..) {
            self.hash_index.remove(&context.hash);
        }
    }

    /// Iterates from the tip back toward the genesis header.
    pub fn iter_rev(&self) -> impl DoubleEndedIterator<Item = &HeaderContext> {
        self.headers.iter().rev()
    }

    /// The last `count` timestamps ending at the tip, oldest first - used
    /// to seed a median-time-past window.
    pub fn last_n_timestamps(&self, count: usize) -> Vec<u32> {
        let len = self.headers.len();
        let start = len.saturating_sub(count);
        self.headers[start..].iter().map(|h| h.header.timestamp).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::BlockHeader;
    use crate::proof_of_work::CompactTarget;

    fn header(height: u64, prev: Hash, nonce: u32) -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: prev,
            merkle_root: Hash::ZERO,
            timestamp: 1_000 + height as u32,
            bits: CompactTarget::from_u32(0x1d00ffff),
            nonce,
        }
    }

    #[test]
    fn push_requires_contiguous_height() {
        let mut chain = HeaderChain::new();
        let genesis = HeaderContext::genesis(header(0, Hash::ZERO, 0));
        chain.push(genesis).unwrap();

        let bad = HeaderContext::genesis(header(0, Hash::ZERO, 1));
        assert!(matches!(
            chain.push(bad),
            Err(ChainStorageError::NonContiguousHeight { height: 0 })
        ));
    }

    #[test]
    fn truncate_length_discards_tail() {
        let mut chain = HeaderChain::new();
        let genesis = HeaderContext::genesis(header(0, Hash::ZERO, 0));
        let next = genesis.extend(header(1, genesis.hash, 1)).unwrap();
        chain.push(genesis).unwrap();
        chain.push(next).unwrap();
        assert_eq!(chain.len(), 2);
        chain.truncate_length(1);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.tip_height(), Some(0));
    }

    #[test]
    fn last_n_timestamps_is_oldest_first_and_bounded() {
        let mut chain = HeaderChain::new();
        let genesis = HeaderContext::genesis(header(0, Hash::ZERO, 0));
        let next = genesis.extend(header(1, genesis.hash, 1)).unwrap();
        chain.push(genesis).unwrap();
        chain.push(next).unwrap();
        let timestamps = chain.last_n_timestamps(5);
        assert_eq!(timestamps, vec![1000, 1001]);
        let bounded = chain.last_n_timestamps(1);
        assert_eq!(bounded, vec![1001]);
    }
}
