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

//! Arena-packed transaction storage.
//!
//! A block's transactions are stored as a handful of flat `Vec`s rather than
//! `Vec<Transaction>` of individually heap-allocated structs: every input,
//! output and witness in the block lives in one contiguous allocation, and
//! each transaction is a cheap `(offset, count)` view into it. This avoids
//! the jagged-allocation overhead a naive nested-`Vec` model pays per
//! transaction, at the cost of giving up in-place structural edits (which
//! this crate never needs - transactions are immutable once decoded).

use crate::hash::{double_sha256, Hash};

use super::outpoint::OutPoint;
use super::wire::{Input, Output, Witness};

/// Flat storage for every transaction in a block.
#[derive(Clone, Debug, Default)]
pub struct TransactionData {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    witnesses: Vec<Witness>,
    details: Vec<TransactionDetail>,
}

/// A sub-array view describing where one transaction's inputs/outputs live
/// within the arena, plus the fields small enough to store inline.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TransactionDetail {
    pub version: i32,
    pub lock_time: u32,
    pub txid: Hash,
    pub wtxid: Hash,
    input_offset: u32,
    input_count: u32,
    output_offset: u32,
    output_count: u32,
}

impl TransactionDetail {
    pub fn input_range(&self) -> std::ops::Range<usize> {
        self.input_offset as usize..(self.input_offset + self.input_count) as usize
    }

    pub fn output_range(&self) -> std::ops::Range<usize> {
        self.output_offset as usize..(self.output_offset + self.output_count) as usize
    }

    /// A transaction is a coinbase iff it has exactly one input and that
    /// input's previous output is the null outpoint.
    pub fn is_coinbase(&self, data: &TransactionData) -> bool {
        let inputs = data.inputs(self);
        inputs.len() == 1 && inputs[0].previous_output.is_null()
    }

    /// A transaction carries witness data iff any of its inputs has a
    /// non-empty witness stack.
    pub fn is_witness(&self, data: &TransactionData) -> bool {
        data.witnesses(self).iter().any(|w| !w.is_empty())
    }
}

/// One transaction plus its per-input/output wire data, used while building
/// a [`TransactionData`] arena.
pub struct TransactionBuilder {
    pub version: i32,
    pub lock_time: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub witnesses: Vec<Witness>,
}

impl TransactionData {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn details(&self) -> &[TransactionDetail] {
        &self.details
    }

    pub fn inputs(&self, detail: &TransactionDetail) -> &[Input] {
        &self.inputs[detail.input_range()]
    }

    pub fn outputs(&self, detail: &TransactionDetail) -> &[Output] {
        &self.outputs[detail.output_range()]
    }

    pub fn witnesses(&self, detail: &TransactionDetail) -> &[Witness] {
        &self.witnesses[detail.input_range()]
    }

    pub fn outpoint(&self, detail: &TransactionDetail, output_index: u32) -> OutPoint {
        OutPoint {
            txid: detail.txid,
            index: output_index,
        }
    }
}

/// Incrementally packs transactions into a [`TransactionData`] arena,
/// computing each transaction's txid/wtxid as it is appended.
#[derive(Default)]
pub struct Builder {
    data: TransactionData,
}

impl Builder {
    pub fn push(&mut self, tx: TransactionBuilder) -> &mut Self {
        let input_offset = self.data.inputs.len() as u32;
        let output_offset = self.data.outputs.len() as u32;
        let input_count = tx.inputs.len() as u32;
        let output_count = tx.outputs.len() as u32;

        let txid = legacy_txid(&tx);
        let has_witness = tx.witnesses.iter().any(|w| !w.is_empty());
        let wtxid = if has_witness { witness_txid(&tx) } else { txid };

        self.data.inputs.extend(tx.inputs);
        self.data.outputs.extend(tx.outputs);
        self.data.witnesses.extend(tx.witnesses);
        self.data.details.push(TransactionDetail {
            version: tx.version,
            lock_time: tx.lock_time,
            txid,
            wtxid,
            input_offset,
            input_count,
            output_offset,
            output_count,
        });
        self
    }

    pub fn build(self) -> TransactionData {
        self.data
    }
}

/// The txid a transaction would have if its witness data were stripped:
/// double-SHA256 over version, inputs, outputs and lock time only.
fn legacy_txid(tx: &TransactionBuilder) -> Hash {
    let mut buf = Vec::new();
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&(tx.inputs.len() as u32).to_le_bytes());
    for input in &tx.inputs {
        buf.extend_from_slice(input.previous_output.txid.as_bytes());
        buf.extend_from_slice(&input.previous_output.index.to_le_bytes());
        buf.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
        buf.extend_from_slice(&input.script_sig);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    buf.extend_from_slice(&(tx.outputs.len() as u32).to_le_bytes());
    for output in &tx.outputs {
        buf.extend_from_slice(&output.value.to_le_bytes());
        buf.extend_from_slice(&(output.script_pubkey.len() as u32).to_le_bytes());
        buf.extend_from_slice(&output.script_pubkey);
    }
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    double_sha256(&buf)
}

/// The wtxid: like [`legacy_txid`] but with the witness stacks folded in.
fn witness_txid(tx: &TransactionBuilder) -> Hash {
    let mut buf = Vec::new();
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&(tx.inputs.len() as u32).to_le_bytes());
    for input in &tx.inputs {
        buf.extend_from_slice(input.previous_output.txid.as_bytes());
        buf.extend_from_slice(&input.previous_output.index.to_le_bytes());
        buf.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
        buf.extend_from_slice(&input.script_sig);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    buf.extend_from_slice(&(tx.outputs.len() as u32).to_le_bytes());
    for output in &tx.outputs {
        buf.extend_from_slice(&output.value.to_le_bytes());
        buf.extend_from_slice(&(output.script_pubkey.len() as u32).to_le_bytes());
        buf.extend_from_slice(&output.script_pubkey);
    }
    for witness in &tx.witnesses {
        buf.extend_from_slice(&(witness.items.len() as u32).to_le_bytes());
        for item in &witness.items {
            buf.extend_from_slice(&(item.len() as u32).to_le_bytes());
            buf.extend_from_slice(item);
        }
    }
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    double_sha256(&buf)
}

#[cfg(test)]
mod test {
    use super::*;

    fn coinbase() -> TransactionBuilder {
        TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input {
                previous_output: OutPoint::NULL,
                script_sig: vec![0x51],
                sequence: 0xffffffff,
            }],
            outputs: vec![Output {
                value: 50_0000_0000,
                script_pubkey: vec![0x51],
            }],
            witnesses: vec![Witness::default()],
        }
    }

    fn spending_tx(prev_txid: Hash) -> TransactionBuilder {
        TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input {
                previous_output: OutPoint { txid: prev_txid, index: 0 },
                script_sig: vec![],
                sequence: 0xffffffff,
            }],
            outputs: vec![Output {
                value: 10_0000_0000,
                script_pubkey: vec![0x51],
            }],
            witnesses: vec![Witness { items: vec![vec![1, 2, 3]] }],
        }
    }

    #[test]
    fn single_coinbase_detail_is_recognized() {
        let mut builder = TransactionData::builder();
        builder.push(coinbase());
        let data = builder.build();
        assert_eq!(data.len(), 1);
        let detail = &data.details()[0];
        assert!(detail.is_coinbase(&data));
        assert!(!detail.is_witness(&data));
    }

    #[test]
    fn witness_tx_has_distinct_txid_and_wtxid() {
        let mut builder = TransactionData::builder();
        builder.push(coinbase());
        let cb_txid = builder.build().details()[0].txid;

        let mut builder = TransactionData::builder();
        builder.push(spending_tx(cb_txid));
        let data = builder.build();
        let detail = &data.details()[0];
        assert!(detail.is_witness(&data));
        assert_ne!(detail.txid, detail.wtxid);
    }

    #[test]
    fn arena_offsets_do_not_overlap_across_transactions() {
        let mut builder = TransactionData::builder();
        builder.push(coinbase());
        let first_txid = {
            let data_ref = &builder.data;
            data_ref.details.last().unwrap().txid
        };
        builder.push(spending_tx(first_txid));
        let data = builder.build();
        assert_eq!(data.len(), 2);
        assert_eq!(data.inputs(&data.details()[0]).len(), 1);
        assert_eq!(data.inputs(&data.details()[1]).len(), 1);
        assert_eq!(data.outputs(&data.details()[0]).len(), 1);
        assert_eq!(data.outputs(&data.details()[1]).len(), 1);
    }
}
