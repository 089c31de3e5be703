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

//! `Table`: append-only output-details storage, a mutable in-memory tail
//! plus committed segments (`spec.md` §4.10).
//!
//! This crate's scope is the validation and sync engine, not an on-disk
//! storage format - `CommitBefore` here compacts the tail into an in-memory
//! `Segment` rather than a file, but keeps the same offset/segment
//! accounting a real disk-backed table would need.

use crate::blocks::Block;

use super::error::UtxoError;
use super::output_kv::OutputId;

/// One output's stored detail: the fields `BlockValidator`'s spending rules
/// need, plus the script bytes a future signature check would need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputRecord {
    pub height: u64,
    pub is_coinbase: bool,
    pub amount: u64,
    pub pk_script: Vec<u8>,
}

struct Segment {
    begin_height: u64,
    end_height: u64,
    base_offset: u64,
    records: Vec<(u64, OutputRecord)>,
}

#[derive(Default)]
pub struct Table {
    segments: Vec<Segment>,
    tail: Vec<(u64, OutputRecord)>,
    next_offset: u64,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// Appends every output of every transaction in `block`, allocating a
    /// fresh `OutputId` for each and pushing its matching Add `OutputKV`
    /// into `entries` - the caller (`SpendJoiner`'s Append stage, via
    /// `Database::append`) is responsible for the `OutputKV` side; this
    /// method only owns the Table's own bookkeeping and returns the ids it
    /// allocated, aligned with the block's transactions in order.
    pub fn append_outputs(&mut self, block: &Block, height: u64) -> Vec<(super::output_kv::OutPoint, OutputId)> {
        let mut allocated = Vec::new();
        for detail in block.transactions.details() {
            let is_coinbase = detail.is_coinbase(&block.transactions);
            for (vout, output) in block.transactions.outputs(detail).iter().enumerate() {
                let offset = self.next_offset;
                let length = output.script_pubkey.len() as u32;
                self.next_offset += length as u64 + 1;
                let record = OutputRecord {
                    height,
                    is_coinbase,
                    amount: output.value,
                    pk_script: output.script_pubkey.clone(),
                };
                self.tail.push((offset, record));
                let id = OutputId { offset, length };
                allocated.push((super::output_kv::OutPoint { txid: detail.txid, index: vout as u32 }, id));
            }
        }
        allocated
    }

    /// Resolves each of `ids` to its stored record, searching committed
    /// segments first, then the mutable tail.
    pub fn fetch(&self, ids: &[OutputId]) -> Result<Vec<OutputRecord>, UtxoError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self
                .segments
                .iter()
                .find_map(|seg| seg.records.iter().find(|(offset, _)| *offset == id.offset).map(|(_, r)| r.clone()))
                .or_else(|| self.tail.iter().find(|(offset, _)| *offset == id.offset).map(|(_, r)| r.clone()))
                .ok_or(UtxoError::UnknownOutputId(*id))?;
            out.push(record);
        }
        Ok(out)
    }

    /// Removes tail records written at or after `height`.
    pub fn erase_since(&mut self, height: u64) {
        self.tail.retain(|(_, record)| record.height < height);
    }

    /// Moves every tail record at a height below `before_height` into a new
    /// committed segment, leaving the tail holding only the most recent
    /// heights.
    pub fn commit_before(&mut self, before_height: u64) {
        let (to_commit, remaining): (Vec<_>, Vec<_>) = self.tail.drain(..).partition(|(_, r)| r.height < before_height);
        self.tail = remaining;
        if to_commit.is_empty() {
            return;
        }
        let begin_height = to_commit.iter().map(|(_, r)| r.height).min().unwrap();
        let end_height = to_commit.iter().map(|(_, r)| r.height).max().unwrap() + 1;
        let base_offset = to_commit.iter().map(|(offset, _)| *offset).min().unwrap();
        self.segments.push(Segment { begin_height, end_height, base_offset, records: to_commit });
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn tail_len(&self) -> usize {
        self.tail.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::BlockHeader;
    use crate::hash::Hash;
    use crate::proof_of_work::CompactTarget;
    use crate::transactions::{Input, OutPoint, Output, TransactionBuilder, TransactionData, Witness};

    fn block_with_one_output(value: u64) -> Block {
        let mut builder = TransactionData::builder();
        builder.push(TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input { previous_output: OutPoint::NULL, script_sig: vec![0x51], sequence: 0xffffffff }],
            outputs: vec![Output { value, script_pubkey: vec![0x51, 0x52] }],
            witnesses: vec![Witness::default()],
        });
        let data = builder.build();
        let header = BlockHeader {
            version: 1,
            prev_block_hash: Hash::ZERO,
            merkle_root: Hash::ZERO,
            timestamp: 0,
            bits: CompactTarget::from_u32(0x1d00ffff),
            nonce: 0,
        };
        Block::new(header, data, 100, 100)
    }

    #[test]
    fn append_then_fetch_round_trips() {
        let mut table = Table::new();
        let block = block_with_one_output(500);
        let allocated = table.append_outputs(&block, 10);
        assert_eq!(allocated.len(), 1);
        let records = table.fetch(&[allocated[0].1]).unwrap();
        assert_eq!(records[0].amount, 500);
        assert!(records[0].is_coinbase);
    }

    #[test]
    fn commit_before_moves_tail_into_a_segment() {
        let mut table = Table::new();
        let block = table_block_at(5);
        table.append_outputs(&block, 5);
        table.commit_before(6);
        assert_eq!(table.segment_count(), 1);
        assert_eq!(table.tail_len(), 0);
    }

    fn table_block_at(_height: u64) -> Block {
        block_with_one_output(1)
    }

    #[test]
    fn erase_since_drops_tail_records_at_or_after_height() {
        let mut table = Table::new();
        let block = block_with_one_output(1);
        table.append_outputs(&block, 5);
        table.erase_since(5);
        assert_eq!(table.tail_len(), 0);
    }
}
