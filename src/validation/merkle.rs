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

//! The Merkle tree reduction shared by a block's transaction-id root and its
//! BIP141 witness root.

use crate::hash::{double_sha256, Hash};

/// Reduces `count` leaves (produced lazily by `leaf_fn` to avoid an upfront
/// allocation of the full leaf set) to a single root, duplicating the last
/// node of any odd-sized level per Bitcoin's classic (malleable) Merkle
/// construction. `unique` is `false` if any sibling pair at any level hashed
/// identically - the signal `BlockValidator` uses to reject duplicate-tx
/// Merkle malleability attempts.
pub fn compute_merkle_root(count: usize, leaf_fn: impl Fn(usize) -> Hash) -> (Hash, bool) {
    if count == 0 {
        return (Hash::ZERO, true);
    }

    let mut level: Vec<Hash> = (0..count).map(leaf_fn).collect();
    let mut unique = true;

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            if pair[0] == pair[1] {
                unique = false;
            }
            let mut buf = [0u8; 64];
            buf[0..32].copy_from_slice(pair[0].as_bytes());
            buf[32..64].copy_from_slice(pair[1].as_bytes());
            next.push(double_sha256(&buf));
        }
        level = next;
    }

    (level[0], unique)
}

#[cfg(test)]
mod test {
    use super::*;

    fn leaf(n: u8) -> Hash {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        Hash::from_bytes(bytes)
    }

    #[test]
    fn empty_tree_is_zero_hash_and_unique() {
        let (root, unique) = compute_merkle_root(0, leaf);
        assert_eq!(root, Hash::ZERO);
        assert!(unique);
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let (root, unique) = compute_merkle_root(1, leaf);
        assert_eq!(root, leaf(0));
        assert!(unique);
    }

    #[test]
    fn odd_leaf_count_duplicates_last_node() {
        let three = compute_merkle_root(3, leaf);
        let four_with_dup = compute_merkle_root(4, |i| if i < 3 { leaf(i as u8) } else { leaf(2) });
        assert_eq!(three.0, four_with_dup.0);
    }

    #[test]
    fn identical_sibling_pair_marks_not_unique() {
        let (_, unique) = compute_merkle_root(2, |_| leaf(7));
        assert!(!unique);
    }

    #[test]
    fn distinct_leaves_are_unique() {
        let (_, unique) = compute_merkle_root(4, |i| leaf(i as u8));
        assert!(unique);
    }
}
