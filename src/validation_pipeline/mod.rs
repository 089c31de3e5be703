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

//! `ValidationPipeline`: the final consensus stage that owns a
//! `SpendPipeline`, waits for each block's spend join to reach `Fetched`,
//! then runs the non-spending and spending rules and reports the verdict
//! (`spec.md` §4.14).

mod error;

pub use error::ValidationPipelineError;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::blocks::Block;
use crate::chain_storage::HeaderTimechain;
use crate::common::{BoundedQueue, Metrics, QueueOutcome, Weighted};
use crate::consensus::ConsensusParams;
use crate::spend::{SpendHandle, SpendPipeline};
use crate::utxo::Database;
use crate::validation::{BlockContext, BlockValidator};

const LOG_TARGET: &str = "tc::validation_pipeline";

/// The seam a host implements to learn the outcome of each submitted
/// block, delivered once per `Submit` call.
pub trait CompleteCallback: Send + Sync {
    fn on_validated(&self, height: u64, result: Result<(), ValidationPipelineError>);
}

struct PendingValidation {
    height: u64,
    block: Arc<Block>,
    handle: SpendHandle,
}

impl Weighted for PendingValidation {
    fn weight(&self) -> u64 {
        self.block.serialized_bytes()
    }
}

/// Owns a [`SpendPipeline`] and a pool of workers that join each block's
/// inputs, then run the non-spending and spending consensus rules against
/// the resolved funding outputs.
pub struct ValidationPipeline {
    spend_pipeline: Arc<SpendPipeline>,
    queue: BoundedQueue<PendingValidation>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ValidationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database: Arc<Database>,
        timechain: Arc<RwLock<HeaderTimechain>>,
        params: Arc<ConsensusParams>,
        metrics: Arc<Metrics>,
        callback: Arc<dyn CompleteCallback>,
        worker_count: usize,
        initial_height: u64,
        max_queue_bytes: u64,
    ) -> Arc<Self> {
        let spend_pipeline = Arc::new(SpendPipeline::new(database, worker_count, initial_height));
        let queue = BoundedQueue::new(max_queue_bytes);

        let mut workers = Vec::with_capacity(worker_count.max(1));
        for id in 0..worker_count.max(1) {
            workers.push(tokio::spawn(run_worker(
                id,
                timechain.clone(),
                params.clone(),
                metrics.clone(),
                callback.clone(),
                queue.clone(),
            )));
        }

        Arc::new(ValidationPipeline {
            spend_pipeline,
            queue,
            workers: Mutex::new(workers),
        })
    }

    /// `Submit(block, height)`: creates a spend join for `block` via the
    /// owned `SpendPipeline`, then enqueues it for a worker to validate
    /// once the join reaches `Fetched`.
    pub async fn submit(&self, block: Arc<Block>, height: u64) {
        let handle = self.spend_pipeline.submit(block.clone(), height);
        self.queue.push(PendingValidation { height, block, handle }).await;
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Cancels every live spend join, stops the queue, and joins every
    /// worker - `spec.md` §5's "cancellation on shutdown unblocks all
    /// workers".
    pub async fn stop(&self) {
        self.spend_pipeline.stop().await;
        self.queue.stop();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
    }
}

/// Up to the last 11 timestamps of the stable chain ending at `height`,
/// oldest first.
fn median_time_past(chain: &crate::chain_storage::HeaderChain, height: u64) -> u32 {
    let window_start = height.saturating_sub(10);
    let mut timestamps: Vec<u32> =
        (window_start..=height).filter_map(|h| chain.get(h).map(|ctx| ctx.header.timestamp)).collect();
    if timestamps.is_empty() {
        return 0;
    }
    timestamps.sort_unstable();
    timestamps[timestamps.len() / 2]
}

async fn run_worker(
    id: usize,
    timechain: Arc<RwLock<HeaderTimechain>>,
    params: Arc<ConsensusParams>,
    metrics: Arc<Metrics>,
    callback: Arc<dyn CompleteCallback>,
    queue: BoundedQueue<PendingValidation>,
) {
    loop {
        let job = match queue.pop().await {
            QueueOutcome::Item(job) => job,
            QueueOutcome::Stopped => break,
        };
        let result = validate_one(&timechain, &params, &job).await;
        match &result {
            Ok(()) => metrics.record_block_validated(),
            Err(err) => tracing::warn!(target: LOG_TARGET, worker = id, height = job.height, %err, "block failed validation"),
        }
        callback.on_validated(job.height, result);
    }
    tracing::debug!(target: LOG_TARGET, worker = id, "validation pipeline worker stopped");
}

async fn validate_one(
    timechain: &RwLock<HeaderTimechain>,
    params: &ConsensusParams,
    job: &PendingValidation,
) -> Result<(), ValidationPipelineError> {
    job.handle.wait_for_fetch().await?;

    let validator = BlockValidator::new(params);
    validator.validate_structural(&job.block)?;

    let median_time_past = {
        let tc = timechain.read();
        median_time_past(tc.chain(), job.height.saturating_sub(1))
    };
    let ctx = BlockContext { height: job.height, median_time_past };
    validator.validate_contextual(&job.block, &ctx)?;

    job.handle
        .with_spending_view(|view, input_count| validator.validate_spending(view, input_count, job.height))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::{BlockHeader, HeaderContext};
    use crate::hash::Hash;
    use crate::proof_of_work::CompactTarget;
    use crate::transactions::{Input, OutPoint, Output, TransactionBuilder, TransactionData, Witness};
    use std::sync::Mutex as StdMutex;

    struct RecordingCallback {
        results: StdMutex<Vec<(u64, bool)>>,
    }

    impl RecordingCallback {
        fn new() -> Self {
            RecordingCallback { results: StdMutex::new(Vec::new()) }
        }
    }

    impl CompleteCallback for RecordingCallback {
        fn on_validated(&self, height: u64, result: Result<(), ValidationPipelineError>) {
            self.results.lock().unwrap().push((height, result.is_ok()));
        }
    }

    fn genesis_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: Hash::ZERO,
            merkle_root: Hash::ZERO,
            timestamp: 1_000,
            bits: CompactTarget::from_u32(0x1d00ffff),
            nonce: 0,
        }
    }

    fn coinbase_block(height: u64, value: u64) -> Block {
        let mut builder = TransactionData::builder();
        let sig_script = vec![height as u8, 0, 0];
        builder.push(TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input { previous_output: OutPoint::NULL, script_sig: sig_script, sequence: 0xffffffff }],
            outputs: vec![Output { value, script_pubkey: vec![0x51] }],
            witnesses: vec![Witness::default()],
        });
        let transactions = builder.build();
        let (root, _) = crate::validation::compute_merkle_root(1, |_| transactions.details()[0].txid);
        let mut header = genesis_header();
        header.merkle_root = root;
        header.timestamp = 1_000 + height as u32;
        Block::new(header, transactions, 100, 100)
    }

    #[tokio::test]
    async fn submits_and_reports_a_validated_coinbase_block() {
        let database = Arc::new(Database::new(2, 4, 4, 1000));
        let genesis = HeaderContext::genesis(genesis_header());
        let mut tc = HeaderTimechain::new(1000);
        tc.add(genesis, None).unwrap();
        let timechain = Arc::new(RwLock::new(tc));
        let params = Arc::new(ConsensusParams::mainnet());
        let metrics = Arc::new(Metrics::new());
        let callback = Arc::new(RecordingCallback::new());

        let pipeline = ValidationPipeline::new(
            database,
            timechain,
            params,
            metrics.clone(),
            callback.clone(),
            2,
            0,
            1 << 20,
        );

        let block = Arc::new(coinbase_block(0, 5_000_000_000));
        pipeline.submit(block, 0).await;

        for _ in 0..200 {
            if !callback.results.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let results = callback.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], (0, true));
        drop(results);

        pipeline.stop().await;
    }
}
