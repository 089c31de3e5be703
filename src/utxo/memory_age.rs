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

//! `MemoryAge`: a time-ordered sequence of `MemoryRun`s (newest last) that
//! becomes compaction-ready once it accumulates `fan_in` runs (`spec.md`
//! §4.9).

use super::memory_run::MemoryRun;
use super::output_kv::{OutPoint, OutputId};

#[derive(Clone, Debug)]
pub struct MemoryAge {
    runs: Vec<MemoryRun>,
    fan_in: usize,
    mutable: bool,
    bucket_bits: u32,
}

impl MemoryAge {
    pub fn new(fan_in: usize, mutable: bool, bucket_bits: u32) -> Self {
        MemoryAge { runs: Vec::new(), fan_in, mutable, bucket_bits }
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn is_compaction_ready(&self) -> bool {
        self.runs.len() >= self.fan_in
    }

    pub fn push(&mut self, run: MemoryRun) {
        self.runs.push(run);
    }

    /// Replaces this age's runs with the result of a compaction, as happens
    /// when this age is the destination of a merge from a younger age.
    pub fn replace_with_merged(&mut self, run: MemoryRun) {
        self.runs = vec![run];
    }

    /// Drains every run, handing ownership to the compactor that merges
    /// them into the next age.
    pub fn take_runs(&mut self) -> Vec<MemoryRun> {
        std::mem::take(&mut self.runs)
    }

    pub fn height_range(&self) -> Option<(u64, u64)> {
        let begin = self.runs.iter().map(|r| r.begin_height()).min()?;
        let end = self.runs.iter().map(|r| r.end_height()).max()?;
        Some((begin, end))
    }

    /// Queries this age's runs newest-first, only resolving slots still
    /// marked unresolved in `resolved`. Returns `(funded, spent)` counts
    /// accumulated across this age.
    pub fn query(&self, keys: &[OutPoint], rids: &mut [OutputId], resolved: &mut [bool]) -> (u64, u64) {
        let mut funded = 0u64;
        let mut spent = 0u64;
        for run in self.runs.iter().rev() {
            if resolved.iter().all(|&r| r) {
                break;
            }
            let mut matched = vec![false; keys.len()];
            let (f, s) = run.query(keys, rids, &mut matched);
            for (i, was_matched) in matched.iter().enumerate() {
                if *was_matched && !resolved[i] {
                    resolved[i] = true;
                }
            }
            funded += f;
            spent += s;
        }
        (funded, spent)
    }

    /// Undoes every run at or after `height`; only meaningful on a mutable
    /// age. Fully-emptied runs are dropped.
    pub fn erase_since(&mut self, height: u64) {
        if !self.mutable {
            return;
        }
        for run in &mut self.runs {
            run.erase_since(height);
        }
        self.runs.retain(|r| !r.is_empty());
    }

    pub fn bucket_bits(&self) -> u32 {
        self.bucket_bits
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::Hash;
    use crate::utxo::output_kv::{Op, OutputKV};

    fn key(byte: u8) -> OutPoint {
        OutPoint { txid: Hash::from_bytes([byte; 32]), index: 0 }
    }

    #[test]
    fn compaction_readiness_tracks_fan_in() {
        let mut age = MemoryAge::new(2, true, 4);
        assert!(!age.is_compaction_ready());
        age.push(MemoryRun::create(vec![], 0, 1, 4, true));
        assert!(!age.is_compaction_ready());
        age.push(MemoryRun::create(vec![], 1, 1, 4, true));
        assert!(age.is_compaction_ready());
    }

    #[test]
    fn query_stops_once_every_slot_resolved() {
        let mut age = MemoryAge::new(4, true, 4);
        let newer = vec![OutputKV { key: key(1), height: 11, op: Op::Spent, rid: OutputId::SPENT }];
        let older = vec![OutputKV { key: key(1), height: 10, op: Op::Add, rid: OutputId { offset: 0, length: 1 } }];
        age.push(MemoryRun::create(older, 10, 1, 4, true));
        age.push(MemoryRun::create(newer, 11, 1, 4, true));

        let mut rids = vec![OutputId::SPENT; 1];
        let mut resolved = vec![false; 1];
        let (funded, spent) = age.query(&[key(1)], &mut rids, &mut resolved);
        assert_eq!((funded, spent), (0, 1));
        assert!(resolved[0]);
    }
}
