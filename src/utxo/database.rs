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

//! `Database`: the read-write-locked façade over `Index` and `Table` that
//! `SpendJoiner` drives (`spec.md` §4.8-§4.11 "UTXO Database").

use parking_lot::RwLock;

use crate::blocks::Block;

use super::error::UtxoError;
use super::index::Index;
use super::memory_run::MemoryRun;
use super::output_kv::{Op, OutPoint, OutputId, OutputKV};
use super::table::{OutputRecord, Table};

pub struct Database {
    table: RwLock<Table>,
    index: RwLock<Index>,
    tip_height: RwLock<Option<u64>>,
    max_keep_depth: u64,
    bucket_bits: u32,
}

impl Database {
    pub fn new(age_count: usize, fan_in: usize, bucket_bits: u32, max_keep_depth: u64) -> Self {
        Database {
            table: RwLock::new(Table::new()),
            index: RwLock::new(Index::new(age_count, fan_in, bucket_bits)),
            tip_height: RwLock::new(None),
            max_keep_depth,
            bucket_bits,
        }
    }

    /// Emits Add `OutputKV`s for every output in `block` and Spent `OutputKV`s
    /// for every non-coinbase input, sorts the batch, and publishes it as a
    /// new run at the index's newest age.
    pub fn append(&self, block: &Block, height: u64) {
        let allocated = self.table.write().append_outputs(block, height);

        let mut entries: Vec<OutputKV> =
            allocated.into_iter().map(|(key, rid)| OutputKV { key, height, op: Op::Add, rid }).collect();

        for detail in block.transactions.details() {
            if detail.is_coinbase(&block.transactions) {
                continue;
            }
            for input in block.transactions.inputs(detail) {
                entries.push(OutputKV { key: input.previous_output, height, op: Op::Spent, rid: OutputId::SPENT });
            }
        }
        entries.sort();

        let run = MemoryRun::create(entries, height, 1, self.bucket_bits, true);
        self.index.write().append(run);

        let mut tip = self.tip_height.write();
        *tip = Some(tip.map_or(height, |t| t.max(height)));
    }

    /// Resolves `keys` against the index, newest age first. `before` should
    /// be the submitting block's own height so a joiner never observes its
    /// own block's outputs.
    pub fn query(&self, keys: &[OutPoint], rids: &mut [OutputId], since: u64, before: u64) -> Result<(u64, u64), UtxoError> {
        self.index.read().query(keys, rids, since, before)
    }

    pub fn fetch(&self, ids: &[OutputId]) -> Result<Vec<OutputRecord>, UtxoError> {
        self.table.read().fetch(ids)
    }

    /// Undoes everything at or after `height`, refusing if it falls outside
    /// the mutable window `[tip - max_keep_depth, tip]`.
    pub fn erase_since(&self, height: u64) -> Result<(), UtxoError> {
        let tip = self.tip_height.read().unwrap_or(0);
        if height < tip.saturating_sub(self.max_keep_depth) {
            return Err(UtxoError::EraseOutsideMutableWindow { height, tip, max_keep_depth: self.max_keep_depth });
        }
        self.index.write().erase_since(height);
        self.table.write().erase_since(height);
        Ok(())
    }

    /// Flushes table records older than `before_height` from the mutable
    /// tail into a committed segment.
    pub fn commit_before(&self, before_height: u64) {
        self.table.write().commit_before(before_height);
    }

    /// Runs one round of background compaction: every age whose run count
    /// has reached its fan-in is merged into the next age.
    pub fn run_compaction(&self) {
        let mut index = self.index.write();
        for age_index in index.compaction_ready_ages() {
            index.compact(age_index);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::BlockHeader;
    use crate::hash::Hash;
    use crate::proof_of_work::CompactTarget;
    use crate::transactions::{Input, Output, TransactionBuilder, TransactionData, Witness};

    fn block(prev_txid: Hash, script: Vec<u8>, value: u64) -> Block {
        let mut builder = TransactionData::builder();
        builder.push(TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input { previous_output: OutPoint { txid: prev_txid, index: 0 }, script_sig: script, sequence: 0xffffffff }],
            outputs: vec![Output { value, script_pubkey: vec![0x51] }],
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
    fn append_then_query_reports_funded() {
        let db = Database::new(2, 4, 4, 100);
        let b = block(Hash::ZERO, vec![], 1000);
        let txid = b.transactions.details()[0].txid;
        db.append(&b, 10);

        let key = OutPoint { txid, index: 0 };
        let mut rids = vec![OutputId::SPENT; 1];
        let (funded, spent) = db.query(&[key], &mut rids, 0, 11).unwrap();
        assert_eq!((funded, spent), (1, 0));
    }

    #[test]
    fn spending_a_block_later_marks_output_spent() {
        let db = Database::new(2, 4, 4, 100);
        let funding = block(Hash::ZERO, vec![], 1000);
        let funding_txid = funding.transactions.details()[0].txid;
        db.append(&funding, 10);

        let spending = block(funding_txid, vec![], 500);
        db.append(&spending, 11);

        let key = OutPoint { txid: funding_txid, index: 0 };
        let mut rids = vec![OutputId::SPENT; 1];
        let (funded, spent) = db.query(&[key], &mut rids, 0, 12).unwrap();
        assert_eq!((funded, spent), (0, 1));
    }

    #[test]
    fn erase_since_outside_mutable_window_is_rejected() {
        let db = Database::new(2, 4, 4, 5);
        let b = block(Hash::ZERO, vec![], 1000);
        db.append(&b, 100);
        assert!(db.erase_since(10).is_err());
        assert!(db.erase_since(96).is_ok());
    }
}
