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

//! The 80-byte block header and its on-chain accounting wrapper
//! ([`HeaderContext`]).

use serde::{Deserialize, Serialize};

use crate::hash::{double_sha256, Hash};
use crate::proof_of_work::{CompactTarget, Work};

/// A block header: exactly 80 bytes on the wire, little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: CompactTarget,
    pub nonce: u32,
}

impl BlockHeader {
    pub const SERIALIZED_SIZE: usize = 80;

    /// Serializes the header to its canonical 80-byte little-endian wire form.
    pub fn to_bytes(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let mut out = [0u8; Self::SERIALIZED_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block_hash.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.as_u32().to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::SERIALIZED_SIZE]) -> Self {
        let mut version_bytes = [0u8; 4];
        version_bytes.copy_from_slice(&bytes[0..4]);
        let mut prev_hash = [0u8; 32];
        prev_hash.copy_from_slice(&bytes[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&bytes[36..68]);
        let mut timestamp_bytes = [0u8; 4];
        timestamp_bytes.copy_from_slice(&bytes[68..72]);
        let mut bits_bytes = [0u8; 4];
        bits_bytes.copy_from_slice(&bytes[72..76]);
        let mut nonce_bytes = [0u8; 4];
        nonce_bytes.copy_from_slice(&bytes[76..80]);

        BlockHeader {
            version: i32::from_le_bytes(version_bytes),
            prev_block_hash: Hash::from_bytes(prev_hash),
            merkle_root: Hash::from_bytes(merkle_root),
            timestamp: u32::from_le_bytes(timestamp_bytes),
            bits: CompactTarget::from_u32(u32::from_le_bytes(bits_bytes)),
            nonce: u32::from_le_bytes(nonce_bytes),
        }
    }

    pub fn compute_hash(&self) -> Hash {
        double_sha256(&self.to_bytes())
    }

    /// The work this header contributes, derived from its `bits` field.
    /// Returns `None` if `bits` does not decode to a valid target - callers
    /// must reject such headers before they ever reach the timechain.
    pub fn work(&self) -> Option<Work> {
        let target = self.bits.expand().ok()?;
        Some(Work::from_target(&target))
    }
}

/// A header together with the accounting the timechain needs to place it:
/// its own hash, the work contributed by this header alone, the cumulative
/// work of the chain ending at this header, and its height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderContext {
    pub header: BlockHeader,
    pub hash: Hash,
    pub local_work: Work,
    pub total_work: Work,
    pub height: u64,
}

impl HeaderContext {
    /// Builds the context for a genesis header (height 0, total work equal
    /// to its own work).
    pub fn genesis(header: BlockHeader) -> Self {
        let hash = header.compute_hash();
        let work = header.work().expect("genesis header has a valid compact target");
        HeaderContext {
            header,
            hash,
            local_work: work,
            total_work: work,
            height: 0,
        }
    }

    /// Extends this context with the next header, accumulating work and
    /// height. The caller is responsible for having already validated that
    /// `next.prev_block_hash == self.hash`.
    pub fn extend(&self, next: BlockHeader) -> Option<HeaderContext> {
        let local_work = next.work()?;
        Some(HeaderContext {
            header: next,
            hash: next.compute_hash(),
            local_work,
            total_work: self.total_work + local_work,
            height: self.height + 1,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: Hash::ZERO,
            merkle_root: Hash::ZERO,
            timestamp: 1_231_006_505,
            bits: CompactTarget::from_u32(0x1d00ffff),
            nonce: 2_083_236_893,
        }
    }

    #[test]
    fn serialization_round_trips() {
        let header = sample_header();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), BlockHeader::SERIALIZED_SIZE);
        assert_eq!(BlockHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn genesis_context_has_height_zero_and_matching_work() {
        let header = sample_header();
        let ctx = HeaderContext::genesis(header);
        assert_eq!(ctx.height, 0);
        assert_eq!(ctx.local_work, ctx.total_work);
    }

    #[test]
    fn extend_accumulates_work_and_height() {
        let genesis = HeaderContext::genesis(sample_header());
        let mut next = sample_header();
        next.prev_block_hash = genesis.hash;
        next.nonce = next.nonce.wrapping_add(1);
        let extended = genesis.extend(next).unwrap();
        assert_eq!(extended.height, 1);
        assert_eq!(extended.total_work, genesis.total_work + extended.local_work);
    }
}
