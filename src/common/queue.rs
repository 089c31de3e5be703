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

//! A FIFO queue bounded by a byte budget rather than an item count, shared
//! between a producer task (the sync orchestrators) and a consumer task
//! (the validation pipeline). `push` blocks the producer while the queue is
//! full; `Stop` wakes every waiter so the pipeline can shut down cleanly
//! instead of leaking a parked task.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Something that can report how many bytes of the budget it consumes.
pub trait Weighted {
    fn weight(&self) -> u64;
}

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    max_bytes: u64,
    current_bytes: Mutex<u64>,
    not_empty: Notify,
    not_full: Notify,
    stopped: Mutex<bool>,
}

/// A cloneable handle to a shared bounded queue.
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        BoundedQueue {
            inner: self.inner.clone(),
        }
    }
}

/// The outcome of waiting on a queue operation.
#[derive(Debug, PartialEq, Eq)]
pub enum QueueOutcome<T> {
    Item(T),
    Stopped,
}

impl<T: Weighted> BoundedQueue<T> {
    pub fn new(max_bytes: u64) -> Self {
        BoundedQueue {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                max_bytes,
                current_bytes: Mutex::new(0),
                not_empty: Notify::new(),
                not_full: Notify::new(),
                stopped: Mutex::new(false),
            }),
        }
    }

    /// Waits until there is room in the queue (or it is stopped) and pushes
    /// `item`. A single item heavier than `max_bytes` is always admitted -
    /// otherwise it could never be pushed at all.
    pub async fn push(&self, item: T) -> bool {
        loop {
            if *self.inner.stopped.lock() {
                return false;
            }
            let weight = item.weight();
            let has_room = {
                let current = *self.inner.current_bytes.lock();
                current == 0 || current + weight <= self.inner.max_bytes
            };
            if has_room {
                *self.inner.current_bytes.lock() += weight;
                self.inner.items.lock().push_back(item);
                self.inner.not_empty.notify_one();
                return true;
            }
            self.inner.not_full.notified().await;
        }
    }

    /// Waits for the next item, or for the queue to be stopped.
    pub async fn pop(&self) -> QueueOutcome<T> {
        loop {
            if let Some(item) = self.inner.items.lock().pop_front() {
                *self.inner.current_bytes.lock() -= item.weight();
                self.inner.not_full.notify_one();
                return QueueOutcome::Item(item);
            }
            if *self.inner.stopped.lock() {
                return QueueOutcome::Stopped;
            }
            self.inner.not_empty.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    /// Wakes every current and future waiter; subsequent `push`/`pop` calls
    /// return immediately with a stopped outcome.
    pub fn stop(&self) {
        *self.inner.stopped.lock() = true;
        self.inner.not_empty.notify_waiters();
        self.inner.not_full.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Drops every queued item matching `predicate`, waking a blocked
    /// producer if this frees room. Used to discard a dropped peer's
    /// queued work without disturbing everyone else's.
    pub fn purge(&self, predicate: impl Fn(&T) -> bool) {
        let mut items = self.inner.items.lock();
        let mut freed = 0u64;
        items.retain(|item| {
            if predicate(item) {
                freed += item.weight();
                false
            } else {
                true
            }
        });
        drop(items);
        if freed > 0 {
            *self.inner.current_bytes.lock() -= freed;
            self.inner.not_full.notify_waiters();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Item(u64);

    impl Weighted for Item {
        fn weight(&self) -> u64 {
            self.0
        }
    }

    #[tokio::test]
    async fn push_then_pop_round_trips() {
        let queue: BoundedQueue<Item> = BoundedQueue::new(1024);
        assert!(queue.push(Item(10)).await);
        assert_eq!(queue.len(), 1);
        match queue.pop().await {
            QueueOutcome::Item(item) => assert_eq!(item.0, 10),
            QueueOutcome::Stopped => panic!("expected an item"),
        }
    }

    #[tokio::test]
    async fn stop_wakes_a_blocked_pop() {
        let queue: BoundedQueue<Item> = BoundedQueue::new(1024);
        let reader = queue.clone();
        let handle = tokio::spawn(async move { reader.pop().await });
        tokio::task::yield_now().await;
        queue.stop();
        let outcome = handle.await.unwrap();
        assert_eq!(outcome, QueueOutcome::Stopped);
    }

    #[tokio::test]
    async fn oversized_single_item_is_still_admitted() {
        let queue: BoundedQueue<Item> = BoundedQueue::new(10);
        assert!(queue.push(Item(100)).await);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn purge_drops_matching_items_and_frees_their_weight() {
        let queue: BoundedQueue<Item> = BoundedQueue::new(1024);
        queue.push(Item(10)).await;
        queue.push(Item(20)).await;
        queue.push(Item(30)).await;

        queue.purge(|item| item.0 == 20);

        assert_eq!(queue.len(), 2);
        let mut seen = Vec::new();
        while let QueueOutcome::Item(item) = queue.pop().await {
            seen.push(item.0);
            if seen.len() == 2 {
                break;
            }
        }
        assert_eq!(seen, vec![10, 30]);
    }
}
