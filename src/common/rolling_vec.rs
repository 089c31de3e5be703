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

//! A fixed-capacity FIFO vector: pushing past capacity silently evicts the
//! oldest element. Used to hold the last N block timestamps for the
//! median-time-past rule without the unbounded growth a plain `Vec` would
//! invite at the tip of a long-running sync.

use std::collections::VecDeque;
use std::ops::Index;

#[derive(Clone, Debug)]
pub struct RollingVec<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RollingVec<T> {
    pub fn new(capacity: usize) -> Self {
        RollingVec {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn from_vec(capacity: usize, mut initial: Vec<T>) -> Self {
        if initial.len() > capacity {
            initial.drain(0..initial.len() - capacity);
        }
        RollingVec {
            capacity,
            items: initial.into(),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Inserts `item` at `index`, evicting the oldest element first if the
    /// vector is already at capacity.
    pub fn insert(&mut self, index: usize, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> Index<usize> for RollingVec<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_beyond_capacity_evicts_oldest() {
        let mut rv = RollingVec::new(3);
        rv.push(1);
        rv.push(2);
        rv.push(3);
        rv.push(4);
        assert_eq!(rv.len(), 3);
        assert_eq!(rv.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn insert_keeps_capacity_bound() {
        let mut rv = RollingVec::new(3);
        rv.push(1);
        rv.push(3);
        rv.insert(1, 2);
        assert_eq!(rv.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        rv.insert(0, 0);
        assert_eq!(rv.len(), 3);
        assert_eq!(rv.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn from_vec_truncates_to_most_recent() {
        let rv = RollingVec::from_vec(2, vec![1, 2, 3]);
        assert_eq!(rv.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }
}
