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

//! A full block: header plus its transactions, kept together with the
//! byte-accounting the sync and validation layers need (serialized size,
//! weight units) so those layers never have to re-serialize a block just to
//! measure it.

use crate::transactions::TransactionData;

use super::header::BlockHeader;

/// Bitcoin's witness scale factor: a witness byte counts a quarter as much
/// as a base byte toward block weight.
pub const WITNESS_SCALE_FACTOR: u64 = 4;

#[derive(Clone, Debug)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: TransactionData,
    serialized_bytes: u64,
    weight_units: u64,
}

impl Block {
    /// Builds a block from its parts. `base_size` and `witness_size` are the
    /// byte counts of the serialization with and without witness data
    /// stripped, respectively; callers get these from the decoder that
    /// produced `transactions`; this type does not itself implement wire
    /// decoding.
    pub fn new(
        header: BlockHeader,
        transactions: TransactionData,
        base_size: u64,
        witness_size: u64,
    ) -> Self {
        let weight_units = base_size * (WITNESS_SCALE_FACTOR - 1) + witness_size;
        Block {
            header,
            transactions,
            serialized_bytes: witness_size,
            weight_units,
        }
    }

    pub fn serialized_bytes(&self) -> u64 {
        self.serialized_bytes
    }

    pub fn weight_units(&self) -> u64 {
        self.weight_units
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::Hash;
    use crate::proof_of_work::CompactTarget;
    use crate::transactions::{Input, Output, OutPoint, TransactionBuilder, Witness};

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: Hash::ZERO,
            merkle_root: Hash::ZERO,
            timestamp: 0,
            bits: CompactTarget::from_u32(0x1d00ffff),
            nonce: 0,
        }
    }

    #[test]
    fn weight_accounts_for_witness_discount() {
        let mut builder = TransactionData::builder();
        builder.push(TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input {
                previous_output: OutPoint::NULL,
                script_sig: vec![],
                sequence: 0xffffffff,
            }],
            outputs: vec![Output {
                value: 0,
                script_pubkey: vec![],
            }],
            witnesses: vec![Witness::default()],
        });
        let data = builder.build();
        let block = Block::new(sample_header(), data, 100, 110);
        assert_eq!(block.weight_units(), 100 * 3 + 110);
        assert_eq!(block.serialized_bytes(), 110);
    }
}
