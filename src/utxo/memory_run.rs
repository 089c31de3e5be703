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

//! `MemoryRun`: an immutable-unless-flagged-otherwise sorted batch of
//! `OutputKV` entries plus a bucket directory for O(1)-ish point lookups
//! (`spec.md` §4.8).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::output_kv::{hash_prefix, OutPoint, Op, OutputId, OutputKV};

#[derive(Clone, Debug)]
pub struct MemoryRun {
    entries: Vec<OutputKV>,
    directory: Vec<u32>,
    bucket_bits: u32,
    begin_height: u64,
    end_height: u64,
    mutable: bool,
}

impl MemoryRun {
    /// Builds a run from entries already sorted by the `OutputKV` total
    /// order, covering heights `[begin_height, begin_height + heights_covered)`.
    pub fn create(entries: Vec<OutputKV>, begin_height: u64, heights_covered: u64, bucket_bits: u32, mutable: bool) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0] <= w[1]), "MemoryRun entries must be pre-sorted");
        let directory = build_directory(&entries, bucket_bits);
        MemoryRun {
            entries,
            directory,
            bucket_bits,
            begin_height,
            end_height: begin_height + heights_covered,
            mutable,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn begin_height(&self) -> u64 {
        self.begin_height
    }

    pub fn end_height(&self) -> u64 {
        self.end_height
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// For each of `keys` looks up the newest matching entry within this run
    /// and fills `rids[i]` if found, setting `matched[i]` so a caller
    /// stepping through several runs/ages can tell "no entry here" apart
    /// from "found, and it happens to be a spend tombstone". Returns
    /// `(funded, spent)` counts for the matches found in this run.
    pub fn query(&self, keys: &[OutPoint], rids: &mut [OutputId], matched: &mut [bool]) -> (u64, u64) {
        let mut funded = 0u64;
        let mut spent = 0u64;
        for (i, key) in keys.iter().enumerate() {
            let prefix = hash_prefix(key, self.bucket_bits) as usize;
            let lo = self.directory[prefix] as usize;
            let hi = self.directory[prefix + 1] as usize;
            if let Some(pos) = self.entries[lo..hi].iter().position(|e| &e.key == key) {
                matched[i] = true;
                match self.entries[lo + pos].op {
                    Op::Add => {
                        rids[i] = self.entries[lo + pos].rid;
                        funded += 1;
                    }
                    Op::Spent => {
                        rids[i] = OutputId::SPENT;
                        spent += 1;
                    }
                }
            }
        }
        (funded, spent)
    }

    /// Undoes entries at or after `height`. Only meaningful on mutable runs;
    /// a no-op on immutable ones.
    pub fn erase_since(&mut self, height: u64) {
        if !self.mutable {
            return;
        }
        if height <= self.begin_height {
            self.entries.clear();
            self.end_height = self.begin_height;
        } else if height < self.end_height {
            self.entries.retain(|e| e.height < height);
            self.end_height = height;
        } else {
            return;
        }
        self.directory = build_directory(&self.entries, self.bucket_bits);
    }

    /// K-way heap merge of `runs` in `OutputKV` order, cancelling an Add
    /// immediately followed by a Spent of the same key when the merge
    /// target is immutable (`spec.md` §4.8 "Merge").
    pub fn merge(runs: &[MemoryRun], bucket_bits: u32, target_mutable: bool) -> MemoryRun {
        let begin_height = runs.iter().map(|r| r.begin_height).min().unwrap_or(0);
        let end_height = runs.iter().map(|r| r.end_height).max().unwrap_or(begin_height);

        let mut heap: BinaryHeap<std::cmp::Reverse<HeapItem>> = BinaryHeap::new();
        for (ri, run) in runs.iter().enumerate() {
            if !run.entries.is_empty() {
                heap.push(std::cmp::Reverse(HeapItem { entry: run.entries[0], run: ri, pos: 0 }));
            }
        }

        let mut merged = Vec::new();
        let mut pending: Option<OutputKV> = None;
        while let Some(std::cmp::Reverse(item)) = heap.pop() {
            let next_pos = item.pos + 1;
            if next_pos < runs[item.run].entries.len() {
                heap.push(std::cmp::Reverse(HeapItem {
                    entry: runs[item.run].entries[next_pos],
                    run: item.run,
                    pos: next_pos,
                }));
            }

            match pending.take() {
                None => pending = Some(item.entry),
                Some(p) => {
                    let cancels = p.key == item.entry.key && p.op == Op::Add && item.entry.op == Op::Spent && !target_mutable;
                    if !cancels {
                        merged.push(p);
                    }
                    pending = Some(item.entry);
                }
            }
        }
        if let Some(p) = pending {
            merged.push(p);
        }

        MemoryRun::create(merged, begin_height, end_height - begin_height, bucket_bits, target_mutable)
    }
}

fn build_directory(entries: &[OutputKV], bucket_bits: u32) -> Vec<u32> {
    let bucket_count = 1u32 << bucket_bits;
    let mut directory = vec![entries.len() as u32; bucket_count as usize + 1];
    let mut b = 0u32;
    for (i, entry) in entries.iter().enumerate() {
        let prefix = hash_prefix(&entry.key, bucket_bits);
        while b <= prefix {
            directory[b as usize] = i as u32;
            b += 1;
        }
    }
    while b <= bucket_count {
        directory[b as usize] = entries.len() as u32;
        b += 1;
    }
    directory
}

#[derive(Clone, Copy)]
struct HeapItem {
    entry: OutputKV,
    run: usize,
    pos: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.entry == other.entry && self.run == other.run && self.pos == other.pos
    }
}
impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.entry.cmp(&other.entry).then_with(|| self.run.cmp(&other.run)).then_with(|| self.pos.cmp(&other.pos))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::Hash;

    fn key(byte: u8) -> OutPoint {
        OutPoint { txid: Hash::from_bytes([byte; 32]), index: 0 }
    }

    fn add(byte: u8, height: u64) -> OutputKV {
        OutputKV { key: key(byte), height, op: Op::Add, rid: OutputId { offset: height, length: 1 } }
    }

    fn spent(byte: u8, height: u64) -> OutputKV {
        OutputKV { key: key(byte), height, op: Op::Spent, rid: OutputId::SPENT }
    }

    #[test]
    fn query_finds_newest_match_by_sort_order() {
        let mut entries = vec![add(1, 10), spent(1, 20)];
        entries.sort();
        let run = MemoryRun::create(entries, 10, 11, 4, true);
        let mut rids = vec![OutputId::SPENT; 1];
        let mut matched = vec![false; 1];
        let (funded, spent_count) = run.query(&[key(1)], &mut rids, &mut matched);
        assert_eq!((funded, spent_count), (0, 1));
        assert!(matched[0]);
    }

    #[test]
    fn erase_since_drops_entries_and_rebuilds_directory() {
        let mut entries = vec![add(1, 10), add(2, 11)];
        entries.sort();
        let mut run = MemoryRun::create(entries, 10, 2, 4, true);
        run.erase_since(11);
        assert_eq!(run.len(), 1);
        let mut rids = vec![OutputId::SPENT; 1];
        let mut matched = vec![false; 1];
        let (funded, _) = run.query(&[key(2)], &mut rids, &mut matched);
        assert_eq!(funded, 0);
        assert!(!matched[0]);
    }

    #[test]
    fn merge_cancels_add_spent_pair_on_immutable_target() {
        let mut entries_a = vec![add(1, 10)];
        entries_a.sort();
        let run_a = MemoryRun::create(entries_a, 10, 1, 4, true);
        let mut entries_b = vec![spent(1, 11)];
        entries_b.sort();
        let run_b = MemoryRun::create(entries_b, 11, 1, 4, true);

        let merged = MemoryRun::merge(&[run_a, run_b], 4, false);
        assert!(merged.is_empty());
    }

    #[test]
    fn merge_preserves_pair_on_mutable_target() {
        let mut entries_a = vec![add(1, 10)];
        entries_a.sort();
        let run_a = MemoryRun::create(entries_a, 10, 1, 4, true);
        let mut entries_b = vec![spent(1, 11)];
        entries_b.sort();
        let run_b = MemoryRun::create(entries_b, 11, 1, 4, true);

        let merged = MemoryRun::merge(&[run_a, run_b], 4, true);
        assert_eq!(merged.len(), 2);
    }
}
