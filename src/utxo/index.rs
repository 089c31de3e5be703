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

//! `Index`: the multi-age, LSM-like structure ages compact into as they
//! fill up (`spec.md` §4.9).

use super::error::UtxoError;
use super::memory_age::MemoryAge;
use super::memory_run::MemoryRun;
use super::output_kv::{OutPoint, OutputId};

/// `ages[0]` is the newest, mutable age that receives every `Append`;
/// `ages[ages.len() - 1]` is the oldest.
pub struct Index {
    ages: Vec<MemoryAge>,
}

impl Index {
    /// Builds an index with `age_count` ages, each with the same fan-in and
    /// bucket width; every age but the last is mutable.
    pub fn new(age_count: usize, fan_in: usize, bucket_bits: u32) -> Self {
        let ages = (0..age_count.max(1))
            .map(|i| MemoryAge::new(fan_in, i + 1 < age_count.max(1), bucket_bits))
            .collect();
        Index { ages }
    }

    /// Appends a freshly-sorted run to the newest (age 0) mutable age.
    pub fn append(&mut self, run: MemoryRun) {
        self.ages[0].push(run);
    }

    /// Ages whose run count has reached their fan-in and are ready for a
    /// background compactor to merge into the next age.
    pub fn compaction_ready_ages(&self) -> Vec<usize> {
        self.ages
            .iter()
            .enumerate()
            .filter(|(i, age)| *i + 1 < self.ages.len() && age.is_compaction_ready())
            .map(|(i, _)| i)
            .collect()
    }

    /// Merges `age_index`'s runs into `age_index + 1`, per its destination
    /// age's mutability.
    pub fn compact(&mut self, age_index: usize) {
        assert!(age_index + 1 < self.ages.len(), "no destination age to compact into");
        let runs = self.ages[age_index].take_runs();
        if runs.is_empty() {
            return;
        }
        let bucket_bits = self.ages[age_index].bucket_bits();
        let target_mutable = self.ages[age_index + 1].is_mutable();
        let merged = MemoryRun::merge(&runs, bucket_bits, target_mutable);
        self.ages[age_index + 1].push(merged);
    }

    /// Looks up `keys` across every age, newest first, filling `rids` on
    /// first match per key. `before` bounds which ages are even consulted:
    /// an immutable age whose height range falls fully inside
    /// `[since, before)` is history that should already have been pruned
    /// from callers' view, and querying it is a caller bug.
    pub fn query(&self, keys: &[OutPoint], rids: &mut [OutputId], since: u64, before: u64) -> Result<(u64, u64), UtxoError> {
        for age in &self.ages {
            if !age.is_mutable() {
                if let Some((begin, end)) = age.height_range() {
                    if since >= begin && before <= end {
                        return Err(UtxoError::QueryTouchesCompactedHistory);
                    }
                }
            }
        }

        let mut resolved = vec![false; keys.len()];
        let mut funded = 0u64;
        let mut spent = 0u64;
        for age in &self.ages {
            if resolved.iter().all(|&r| r) {
                break;
            }
            let (f, s) = age.query(keys, rids, &mut resolved);
            funded += f;
            spent += s;
        }
        Ok((funded, spent))
    }

    /// Propagates an undo to every mutable age that intersects `[height, ∞)`.
    pub fn erase_since(&mut self, height: u64) {
        for age in &mut self.ages {
            if age.is_mutable() {
                age.erase_since(height);
            }
        }
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

    fn run(byte: u8, height: u64) -> MemoryRun {
        let entries = vec![OutputKV { key: key(byte), height, op: Op::Add, rid: OutputId { offset: height, length: 1 } }];
        MemoryRun::create(entries, height, 1, 4, true)
    }

    #[test]
    fn append_and_query_round_trip() {
        let mut index = Index::new(2, 4, 4);
        index.append(run(1, 10));
        let mut rids = vec![OutputId::SPENT; 1];
        let (funded, spent) = index.query(&[key(1)], &mut rids, 0, 11).unwrap();
        assert_eq!((funded, spent), (1, 0));
        assert_eq!(rids[0], OutputId { offset: 10, length: 1 });
    }

    #[test]
    fn compaction_moves_runs_to_next_age() {
        let mut index = Index::new(2, 1, 4);
        index.append(run(1, 10));
        assert!(index.compaction_ready_ages().contains(&0));
        index.compact(0);
        assert_eq!(index.ages[0].run_count(), 0);
        assert_eq!(index.ages[1].run_count(), 1);
    }

    #[test]
    fn erase_since_undoes_mutable_ages_only() {
        let mut index = Index::new(2, 4, 4);
        index.append(run(1, 10));
        index.erase_since(10);
        let mut rids = vec![OutputId::SPENT; 1];
        let (funded, _) = index.query(&[key(1)], &mut rids, 0, 11).unwrap();
        assert_eq!(funded, 0);
    }
}
