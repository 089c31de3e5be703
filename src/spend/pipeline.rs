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

//! `SpendPipeline`: schedules `SpendJoiner`s across a worker pool while
//! enforcing that `Append(h)` completes before `Append(h+1)` begins
//! (`spec.md` §4.11, §5 "Ordering guarantees").

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::blocks::Block;
use crate::utxo::Database;
use crate::validation::SpendingView;

use super::error::SpendError;
use super::joiner::{JoinerState, SpendJoiner, SpendRecord};

const LOG_TARGET: &str = "tc::spend::pipeline";

struct PendingJob {
    height: u64,
    block: Arc<Block>,
    joiner: Arc<Mutex<SpendJoiner>>,
    done: Arc<Notify>,
}

impl PartialEq for PendingJob {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height
    }
}
impl Eq for PendingJob {}
impl PartialOrd for PendingJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.height.cmp(&other.height)
    }
}

/// The min-heap-by-height ready queue plus blocked list described in
/// `spec.md` §4.11: a job is ready only once `next_append_height` reaches
/// its height; `advance` promotes newly-unblocked jobs after each Append.
struct Scheduler {
    next_append_height: Mutex<u64>,
    ready: Mutex<BinaryHeap<Reverse<PendingJob>>>,
    blocked: Mutex<Vec<PendingJob>>,
    notify: Notify,
    stopped: Mutex<bool>,
}

impl Scheduler {
    fn enqueue(&self, job: PendingJob) {
        let cursor = *self.next_append_height.lock();
        if job.height == cursor {
            self.ready.lock().push(Reverse(job));
        } else {
            self.blocked.lock().push(job);
        }
        self.notify.notify_waiters();
    }

    async fn next_ready(&self) -> Option<PendingJob> {
        loop {
            if let Some(Reverse(job)) = self.ready.lock().pop() {
                return Some(job);
            }
            if *self.stopped.lock() {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Advances the cursor past `completed_height` and promotes any blocked
    /// job whose height now matches it.
    fn advance(&self, completed_height: u64) {
        {
            let mut cursor = self.next_append_height.lock();
            if *cursor == completed_height {
                *cursor = completed_height + 1;
            }
        }
        let cursor = *self.next_append_height.lock();
        let mut blocked = self.blocked.lock();
        let mut ready = self.ready.lock();
        let mut i = 0;
        while i < blocked.len() {
            if blocked[i].height == cursor {
                ready.push(Reverse(blocked.remove(i)));
            } else {
                i += 1;
            }
        }
        drop(ready);
        drop(blocked);
        self.notify.notify_waiters();
    }

    /// Stops the scheduler and hands back every job still waiting, ready or
    /// blocked, for cancellation.
    fn stop_and_drain(&self) -> Vec<PendingJob> {
        *self.stopped.lock() = true;
        self.notify.notify_waiters();
        let mut drained: Vec<PendingJob> = self.ready.lock().drain().map(|Reverse(job)| job).collect();
        drained.extend(self.blocked.lock().drain(..));
        drained
    }
}

/// A handle to one block's in-flight spend join, returned by
/// [`SpendPipeline::submit`].
pub struct SpendHandle {
    height: u64,
    joiner: Arc<Mutex<SpendJoiner>>,
    done: Arc<Notify>,
}

impl SpendHandle {
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Blocks until this joiner reaches `Fetched`/`Joined`, or returns the
    /// error that stopped it - including [`SpendError::Cancelled`] if
    /// [`SpendPipeline::stop`] ran first.
    pub async fn wait_for_fetch(&self) -> Result<(), SpendError> {
        loop {
            {
                let joiner = self.joiner.lock();
                match joiner.state() {
                    JoinerState::Fetched | JoinerState::Joined => return Ok(()),
                    JoinerState::Error(err) => return Err(err.clone()),
                    _ => {}
                }
            }
            self.done.notified().await;
        }
    }

    /// Runs the Join stage, streaming one [`SpendRecord`] per non-coinbase
    /// input in original block order. Only meaningful after
    /// [`Self::wait_for_fetch`] has returned `Ok`.
    pub fn join(&self, callback: impl FnMut(SpendRecord<'_>)) -> Result<(), SpendError> {
        self.joiner.lock().join(callback)
    }

    /// Hands a [`SpendingView`] over this joiner's resolved outputs to `f`,
    /// for feeding `BlockValidator::validate_spending`. Only meaningful
    /// after `join` has run.
    pub fn with_spending_view<R>(&self, f: impl FnOnce(&dyn SpendingView, usize) -> R) -> R {
        let joiner = self.joiner.lock();
        let view = joiner.spending_view();
        f(&view, joiner.input_count())
    }
}

/// Schedules `SpendJoiner`s across `worker_count` background tasks,
/// enforcing the height-ordered Append constraint via a min-heap ready
/// queue and a blocked list.
pub struct SpendPipeline {
    scheduler: Arc<Scheduler>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SpendPipeline {
    /// `initial_height` is the first height this pipeline will ever Append -
    /// typically one past the UTXO database's current tip.
    pub fn new(database: Arc<Database>, worker_count: usize, initial_height: u64) -> Self {
        let scheduler = Arc::new(Scheduler {
            next_append_height: Mutex::new(initial_height),
            ready: Mutex::new(BinaryHeap::new()),
            blocked: Mutex::new(Vec::new()),
            notify: Notify::new(),
            stopped: Mutex::new(false),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count.max(1) {
            let scheduler = scheduler.clone();
            let database = database.clone();
            workers.push(tokio::spawn(run_worker(id, scheduler, database)));
        }

        SpendPipeline { scheduler, workers: Mutex::new(workers) }
    }

    /// Creates a joiner for `block` at `height` and enqueues it; the job
    /// becomes ready once every lower height has Appended.
    pub fn submit(&self, block: Arc<Block>, height: u64) -> SpendHandle {
        let joiner = Arc::new(Mutex::new(SpendJoiner::new(&block, height)));
        let done = Arc::new(Notify::new());
        self.scheduler.enqueue(PendingJob { height, block, joiner: joiner.clone(), done: done.clone() });
        SpendHandle { height, joiner, done }
    }

    /// Cancels every live joiner, wakes every worker and joins them -
    /// `spec.md` §5's `SpendPipeline::Stop`.
    pub async fn stop(&self) {
        for job in self.scheduler.stop_and_drain() {
            job.joiner.lock().cancel();
            job.done.notify_waiters();
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
    }
}

async fn run_worker(id: usize, scheduler: Arc<Scheduler>, database: Arc<Database>) {
    while let Some(job) = scheduler.next_ready().await {
        let height = job.height;
        {
            let mut joiner = job.joiner.lock();
            if let Err(err) = joiner.append(&database, &job.block) {
                tracing::warn!(target: LOG_TARGET, worker = id, height, %err, "spend join append failed");
            }
        }
        scheduler.advance(height);
        {
            let mut joiner = job.joiner.lock();
            if joiner.query(&database).is_ok() {
                if let Err(err) = joiner.fetch(&database) {
                    tracing::warn!(target: LOG_TARGET, worker = id, height, %err, "spend join fetch failed");
                }
            }
        }
        job.done.notify_waiters();
    }
    tracing::debug!(target: LOG_TARGET, worker = id, "spend pipeline worker stopped");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::BlockHeader;
    use crate::hash::Hash;
    use crate::proof_of_work::CompactTarget;
    use crate::transactions::{Input, OutPoint, Output, TransactionBuilder, TransactionData, Witness};

    fn header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: Hash::ZERO,
            merkle_root: Hash::ZERO,
            timestamp: 0,
            bits: CompactTarget::from_u32(0x1d00ffff),
            nonce: 0,
        }
    }

    fn coinbase_block(value: u64) -> Block {
        let mut builder = TransactionData::builder();
        builder.push(TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input { previous_output: OutPoint::NULL, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![Output { value, script_pubkey: vec![0x51] }],
            witnesses: vec![Witness::default()],
        });
        Block::new(header(), builder.build(), 100, 100)
    }

    fn spending_block(prev_txid: Hash, value: u64) -> Block {
        let mut builder = TransactionData::builder();
        builder.push(TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input {
                previous_output: OutPoint { txid: prev_txid, index: 0 },
                script_sig: vec![],
                sequence: 0xffffffff,
            }],
            outputs: vec![Output { value, script_pubkey: vec![0x51] }],
            witnesses: vec![Witness::default()],
        });
        Block::new(header(), builder.build(), 100, 100)
    }

    #[tokio::test]
    async fn joins_a_spending_block_against_its_funding_output() {
        let database = Arc::new(Database::new(2, 4, 4, 1000));
        let pipeline = SpendPipeline::new(database.clone(), 2, 10);

        let funding = coinbase_block(5_000_000_000);
        let funding_txid = funding.transactions.details()[0].txid;
        let handle = pipeline.submit(Arc::new(funding), 10);
        handle.wait_for_fetch().await.unwrap();

        let spending = spending_block(funding_txid, 4_000_000_000);
        let handle = pipeline.submit(Arc::new(spending), 11);
        handle.wait_for_fetch().await.unwrap();

        let mut amounts = Vec::new();
        handle.join(|record| amounts.push(record.amount)).unwrap();
        assert_eq!(amounts, vec![5_000_000_000]);

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn later_height_waits_for_earlier_append_before_fetching() {
        let database = Arc::new(Database::new(2, 4, 4, 1000));
        let pipeline = SpendPipeline::new(database.clone(), 2, 10);

        let funding = coinbase_block(1_000);
        let funding_txid = funding.transactions.details()[0].txid;

        // Submit height 11 first; it must not complete before height 10 does.
        let spending = spending_block(funding_txid, 500);
        let later = pipeline.submit(Arc::new(spending), 11);
        let earlier = pipeline.submit(Arc::new(funding), 10);

        earlier.wait_for_fetch().await.unwrap();
        later.wait_for_fetch().await.unwrap();

        pipeline.stop().await;
    }
}
