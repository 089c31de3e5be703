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

//! Hand-rolled block/header builders shared by this crate's own tests and
//! by downstream crates exercising it against real `BlockHeader`/`Block`
//! values instead of mocks.

use crate::blocks::{Block, BlockHeader, HeaderContext};
use crate::hash::Hash;
use crate::proof_of_work::CompactTarget;
use crate::transactions::{Input, OutPoint, Output, TransactionBuilder, TransactionData, Witness};

/// An easily-satisfied target (`0x207fffff`) so header builders don't need
/// to grind real mainnet difficulty. Callers that want `0x1d00ffff`'s
/// genesis-era difficulty should mine by hand instead.
pub const EASY_BITS: u32 = 0x207f_ffff;

/// Mines a header extending `prev` at `timestamp` against [`EASY_BITS`],
/// starting from nonce 0. Panics if no satisfying nonce turns up in the
/// first 100,000 tries - which would indicate `EASY_BITS` stopped being
/// easy, not bad luck.
pub fn mine_header(prev: Hash, timestamp: u32, bits: u32) -> BlockHeader {
    let mut header = BlockHeader {
        version: 4,
        prev_block_hash: prev,
        merkle_root: Hash::ZERO,
        timestamp,
        bits: CompactTarget::from_u32(bits),
        nonce: 0,
    };
    for nonce in 0..100_000u32 {
        header.nonce = nonce;
        let target = header.bits.expand().expect("test bits always decode");
        if target.is_satisfied_by(&header.compute_hash()) {
            return header;
        }
    }
    panic!("failed to mine a header satisfying bits=0x{bits:08x} within 100,000 tries");
}

/// A genesis [`HeaderContext`] mined against [`EASY_BITS`].
pub fn genesis_context(timestamp: u32) -> HeaderContext {
    HeaderContext::genesis(mine_header(Hash::ZERO, timestamp, EASY_BITS))
}

/// The minimal-push BIP34 encoding of `height`, as `BlockValidator`
/// expects to find at the start of the coinbase's signature script.
fn minimal_push_height(height: u64) -> Vec<u8> {
    if height == 0 {
        return vec![0x00];
    }
    let mut num = Vec::new();
    let mut value = height;
    while value > 0 {
        num.push((value & 0xff) as u8);
        value >>= 8;
    }
    if num.last().copied().unwrap_or(0) & 0x80 != 0 {
        num.push(0x00);
    }
    let mut out = vec![num.len() as u8];
    out.extend(num);
    out
}

/// A single-output coinbase block at `height`, with a correctly-encoded
/// BIP34 height push and a matching Merkle root. No witness commitment -
/// callers exercising BIP141 need to add one themselves.
pub fn coinbase_block(prev: Hash, height: u64, timestamp: u32, value: u64) -> Block {
    let mut builder = TransactionData::builder();
    builder.push(TransactionBuilder {
        version: 1,
        lock_time: 0,
        inputs: vec![Input {
            previous_output: OutPoint::NULL,
            script_sig: minimal_push_height(height),
            sequence: 0xffff_ffff,
        }],
        outputs: vec![Output { value, script_pubkey: vec![0x51] }],
        witnesses: vec![Witness::default()],
    });
    let transactions = builder.build();
    let (merkle_root, _) = crate::validation::compute_merkle_root(1, |i| transactions.details()[i].txid);

    let mut header = mine_header(prev, timestamp, EASY_BITS);
    header.merkle_root = merkle_root;
    Block::new(header, transactions, 100, 100)
}

/// A single-input, single-output block that spends `previous_output`
/// wholesale into one new output.
pub fn spending_block(prev: Hash, previous_output: OutPoint, timestamp: u32, value: u64) -> Block {
    let mut builder = TransactionData::builder();
    builder.push(TransactionBuilder {
        version: 1,
        lock_time: 0,
        inputs: vec![Input { previous_output, script_sig: vec![], sequence: 0xffff_ffff }],
        outputs: vec![Output { value, script_pubkey: vec![0x51] }],
        witnesses: vec![Witness::default()],
    });
    let transactions = builder.build();
    let (merkle_root, _) = crate::validation::compute_merkle_root(1, |i| transactions.details()[i].txid);

    let mut header = mine_header(prev, timestamp, EASY_BITS);
    header.merkle_root = merkle_root;
    Block::new(header, transactions, 100, 100)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mined_header_satisfies_its_own_target() {
        let header = mine_header(Hash::ZERO, 1_000, EASY_BITS);
        let target = header.bits.expand().unwrap();
        assert!(target.is_satisfied_by(&header.compute_hash()));
    }

    #[test]
    fn coinbase_block_merkle_root_matches_its_single_transaction() {
        let block = coinbase_block(Hash::ZERO, 5, 1_000, 5_000_000_000);
        let details = block.transactions.details();
        assert_eq!(details.len(), 1);
        assert_eq!(block.header.merkle_root, details[0].txid);
    }
}
