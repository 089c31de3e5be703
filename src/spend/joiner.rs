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

//! `SpendJoiner`: per-block state machine joining a block's non-coinbase
//! inputs against the UTXO database without a hash map, by sorting and
//! re-sorting a small working set at each stage boundary (`spec.md` §4.11).

use crate::blocks::Block;
use crate::utxo::{Database, OutPoint, OutputId};
use crate::validation::{FundingOutput, SpendingView};

use super::error::SpendError;

const LOG_TARGET: &str = "tc::spend::joiner";

/// Where a joiner sits in its own lifecycle. `Error` carries the consensus
/// or storage failure that stopped it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinerState {
    Init,
    Parsed,
    Appended,
    Queried,
    Fetched,
    Joined,
    Error(SpendError),
}

impl JoinerState {
    fn name(&self) -> &'static str {
        match self {
            JoinerState::Init => "Init",
            JoinerState::Parsed => "Parsed",
            JoinerState::Appended => "Appended",
            JoinerState::Queried => "Queried",
            JoinerState::Fetched => "Fetched",
            JoinerState::Joined => "Joined",
            JoinerState::Error(_) => "Error",
        }
    }
}

/// One working slot: a non-coinbase input, carried through Parse -> Query ->
/// Fetch -> Join, re-sorted by a different key at each boundary.
#[derive(Clone)]
struct Slot {
    /// Position among this block's non-coinbase inputs, in original block
    /// order - the index `BlockValidator::validate_spending` indexes by.
    order: usize,
    tx_index: usize,
    input_index: usize,
    key: OutPoint,
    rid: OutputId,
    pubkey_script: Vec<u8>,
    funding: Option<FundingOutput>,
}

/// One resolved funding output, handed to the caller's Join callback in
/// original block order.
pub struct SpendRecord<'a> {
    pub funding_height: u64,
    pub funding_is_coinbase: bool,
    pub amount: u64,
    pub pubkey_script: &'a [u8],
    pub tx_index: usize,
    pub spend_input_index: usize,
}

pub struct SpendJoiner {
    height: u64,
    state: JoinerState,
    slots: Vec<Slot>,
}

impl SpendJoiner {
    /// Parse stage (`Init -> Parsed`): enumerates `block`'s non-coinbase
    /// inputs and sorts them by previous-output key.
    pub fn new(block: &Block, height: u64) -> Self {
        let mut slots = Vec::new();
        let mut order = 0usize;
        for (tx_index, detail) in block.transactions.details().iter().enumerate() {
            if detail.is_coinbase(&block.transactions) {
                continue;
            }
            for (input_index, input) in block.transactions.inputs(detail).iter().enumerate() {
                slots.push(Slot {
                    order,
                    tx_index,
                    input_index,
                    key: input.previous_output,
                    rid: OutputId::SPENT,
                    pubkey_script: Vec::new(),
                    funding: None,
                });
                order += 1;
            }
        }
        slots.sort_by_key(|s| s.key);
        tracing::trace!(target: LOG_TARGET, height, inputs = slots.len(), "parsed block for spend join");
        SpendJoiner { height, state: JoinerState::Parsed, slots }
    }

    pub fn state(&self) -> &JoinerState {
        &self.state
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn input_count(&self) -> usize {
        self.slots.len()
    }

    /// Append stage (`Parsed -> Appended`): publishes `block`'s own outputs
    /// and tombstones into the database. The **caller** (`SpendPipeline`) is
    /// responsible for the height-ordering requirement in `spec.md` §4.11 -
    /// this method only performs the write and the local state transition.
    pub fn append(&mut self, database: &Database, block: &Block) -> Result<(), SpendError> {
        self.require_state(JoinerState::Parsed, "append")?;
        database.append(block, self.height);
        self.state = JoinerState::Appended;
        Ok(())
    }

    /// Query stage (`Appended -> Queried | Error`): resolves every input's
    /// previous output, bounded to `before = height` so a joiner never
    /// observes its own block's outputs.
    pub fn query(&mut self, database: &Database) -> Result<(), SpendError> {
        self.require_state(JoinerState::Appended, "query")?;

        let keys: Vec<OutPoint> = self.slots.iter().map(|s| s.key).collect();
        let mut rids = vec![OutputId::SPENT; keys.len()];
        let (funded, _spent) = match database.query(&keys, &mut rids, 0, self.height) {
            Ok(counts) => counts,
            Err(err) => {
                let err = SpendError::Utxo(err);
                self.state = JoinerState::Error(err.clone());
                return Err(err);
            }
        };

        for (slot, rid) in self.slots.iter_mut().zip(rids.iter()) {
            slot.rid = *rid;
        }

        if funded as usize != keys.len() || self.slots.iter().any(|s| s.rid.is_spent_sentinel()) {
            let bad = self
                .slots
                .iter()
                .find(|s| s.rid.is_spent_sentinel())
                .map(|s| s.order)
                .unwrap_or(0);
            let err = SpendError::UnresolvedOrSpentOutput(bad);
            self.state = JoinerState::Error(err.clone());
            return Err(err);
        }

        self.slots.sort_by_key(|s| (s.rid.offset, s.rid.length));
        self.state = JoinerState::Queried;
        Ok(())
    }

    /// Fetch stage (`Queried -> Fetched`): resolves each rid to its stored
    /// output record, then re-sorts back into natural block order so Join
    /// can stream results in original-order.
    pub fn fetch(&mut self, database: &Database) -> Result<(), SpendError> {
        self.require_state(JoinerState::Queried, "fetch")?;

        let ids: Vec<OutputId> = self.slots.iter().map(|s| s.rid).collect();
        let records = match database.fetch(&ids) {
            Ok(records) => records,
            Err(err) => {
                let err = SpendError::Utxo(err);
                self.state = JoinerState::Error(err.clone());
                return Err(err);
            }
        };
        for (slot, record) in self.slots.iter_mut().zip(records.into_iter()) {
            slot.funding = Some(FundingOutput {
                funding_height: record.height,
                is_coinbase: record.is_coinbase,
                amount: record.amount,
            });
            slot.pubkey_script = record.pk_script;
        }

        self.slots.sort_by_key(|s| s.order);
        self.state = JoinerState::Fetched;
        Ok(())
    }

    /// Join stage (`Fetched -> Joined`): streams one [`SpendRecord`] per
    /// non-coinbase input, in original block order.
    pub fn join(&mut self, mut callback: impl FnMut(SpendRecord<'_>)) -> Result<(), SpendError> {
        self.require_state(JoinerState::Fetched, "join")?;
        for slot in &self.slots {
            let funding = slot.funding.as_ref().expect("fetched slots always carry a funding output");
            callback(SpendRecord {
                funding_height: funding.funding_height,
                funding_is_coinbase: funding.is_coinbase,
                amount: funding.amount,
                pubkey_script: &slot.pubkey_script,
                tx_index: slot.tx_index,
                spend_input_index: slot.input_index,
            });
        }
        self.state = JoinerState::Joined;
        Ok(())
    }

    /// Cancels a joiner that is blocked waiting for its Append prerequisite,
    /// per `spec.md` §5's `SpendPipeline::Stop` behaviour.
    pub fn cancel(&mut self) {
        self.state = JoinerState::Error(SpendError::Cancelled);
    }

    /// A [`SpendingView`] over this joiner's resolved outputs, for
    /// [`BlockValidator::validate_spending`]. Only meaningful once `join`
    /// has run.
    pub fn spending_view(&self) -> JoinedSpendingView<'_> {
        JoinedSpendingView { slots: &self.slots }
    }

    fn require_state(&self, expected: JoinerState, method: &'static str) -> Result<(), SpendError> {
        if std::mem::discriminant(&self.state) != std::mem::discriminant(&expected) {
            return Err(SpendError::UnexpectedState {
                method,
                expected: expected.name(),
                found: self.state.name(),
            });
        }
        Ok(())
    }
}

/// Adapts a joined [`SpendJoiner`]'s slots to [`BlockValidator`]'s
/// [`SpendingView`] trait, indexed by original non-coinbase-input order.
pub struct JoinedSpendingView<'a> {
    slots: &'a [Slot],
}

impl<'a> SpendingView for JoinedSpendingView<'a> {
    fn funding_output(&self, input_index: usize) -> Option<&FundingOutput> {
        self.slots.iter().find(|s| s.order == input_index).and_then(|s| s.funding.as_ref())
    }
}
