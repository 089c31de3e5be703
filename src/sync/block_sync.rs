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

//! `BlockSync`: single in-flight `getdata`, structural and contextual body
//! validation, and sidecar bookkeeping (`spec.md` §4.13).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::blocks::Block;
use crate::chain_storage::HeaderTimechain;
use crate::common::{BoundedQueue, Metrics, QueueOutcome, Timeout, Weighted};
use crate::consensus::ConsensusParams;
use crate::hash::Hash;
use crate::validation::{BlockContext, BlockValidator};

use super::error::BlockSyncError;
use super::sidecar::{ValidationStatus, ValidationStatusSidecar};
use super::{Peer, SyncHandler, SyncRequest};

const LOG_TARGET: &str = "tc::sync::block";

/// What `BlockSync` should request next, or `End` if the sidecar shows no
/// further gaps up to the current header tip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextBlockRequest {
    Height(u64),
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RequestKey {
    height: u64,
    hash: Hash,
}

struct BlockItem {
    peer: Peer,
    height: u64,
    block: Block,
}

impl Weighted for BlockItem {
    fn weight(&self) -> u64 {
        self.block.serialized_bytes()
    }
}

/// Drives block-body validation during sync: requests one block at a time,
/// matches responses against the outstanding request, and hands validated
/// heights to the [`ValidationStatusSidecar`].
pub struct BlockSync {
    timechain: Arc<RwLock<HeaderTimechain>>,
    sidecar: Arc<ValidationStatusSidecar>,
    peer: Mutex<Option<Peer>>,
    request: Mutex<Option<RequestKey>>,
    last_completed: Mutex<Option<RequestKey>>,
    reported_end: Mutex<bool>,
    request_timeout: Duration,
    request_deadline: Mutex<Option<(Peer, Timeout)>>,
    queue: BoundedQueue<BlockItem>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BlockSync {
    pub fn new(
        timechain: Arc<RwLock<HeaderTimechain>>,
        sidecar: Arc<ValidationStatusSidecar>,
        params: Arc<ConsensusParams>,
        metrics: Arc<Metrics>,
        max_queue_bytes: u64,
        request_timeout: Duration,
    ) -> Arc<Self> {
        let queue = BoundedQueue::new(max_queue_bytes);
        let sync = Arc::new(BlockSync {
            timechain: timechain.clone(),
            sidecar: sidecar.clone(),
            peer: Mutex::new(None),
            request: Mutex::new(None),
            last_completed: Mutex::new(None),
            reported_end: Mutex::new(false),
            request_timeout,
            request_deadline: Mutex::new(None),
            queue: queue.clone(),
            worker: Mutex::new(None),
        });
        let worker = tokio::spawn(run_worker(timechain, sidecar, params, metrics, queue));
        *sync.worker.lock() = Some(worker);
        sync
    }

    /// Begins requesting blocks from `peer`, starting wherever the sidecar
    /// shows the first gap.
    pub fn start_sync(&self, peer: Peer, handler: &dyn SyncHandler) {
        *self.peer.lock() = Some(peer);
        self.try_request_next(handler);
    }

    /// The height `BlockSync` would request next, per the selection rule in
    /// `spec.md` §4.13: continue past the last completed request if the
    /// header chain still agrees with it, otherwise fall back to the first
    /// sidecar gap.
    pub fn next_request(&self) -> NextBlockRequest {
        let tc = self.timechain.read();
        let chain = tc.chain();
        let Some(tip) = chain.tip_height() else {
            return NextBlockRequest::End;
        };

        if let Some(last) = *self.last_completed.lock() {
            if chain.hash_at(last.height) == Some(last.hash) {
                let next_height = last.height + 1;
                if next_height <= tip {
                    return NextBlockRequest::Height(next_height);
                }
            }
        }

        match self.sidecar.find_in_chain_if(0, tip, |s| s == ValidationStatus::Unvalidated) {
            Some(height) => NextBlockRequest::Height(height),
            None => NextBlockRequest::End,
        }
    }

    fn try_request_next(&self, handler: &dyn SyncHandler) {
        if self.request.lock().is_some() {
            return;
        }
        let Some(peer) = *self.peer.lock() else { return };

        match self.next_request() {
            NextBlockRequest::Height(height) => {
                let hash = { self.timechain.read().chain().hash_at(height) };
                let Some(hash) = hash else { return };
                *self.request.lock() = Some(RequestKey { height, hash });
                *self.reported_end.lock() = false;
                *self.request_deadline.lock() = Some((peer, Timeout::from_duration(self.request_timeout)));
                handler.on_request(peer, SyncRequest::GetData { height, hash });
            }
            NextBlockRequest::End => {
                let mut reported = self.reported_end.lock();
                if !*reported {
                    *reported = true;
                    handler.on_complete(peer);
                }
            }
        }
    }

    /// `OnBlock(peer, message)`: matches the response against the
    /// outstanding request, enqueues it for the worker, and immediately
    /// tries to request the next block.
    pub async fn on_block(
        &self,
        peer: Peer,
        hash: Hash,
        block: Block,
        handler: &dyn SyncHandler,
    ) -> Result<(), BlockSyncError> {
        let Some(req) = *self.request.lock() else {
            tracing::debug!(target: LOG_TARGET, peer, "received a block with no request outstanding");
            return Err(BlockSyncError::UnexpectedBlock);
        };
        if hash != req.hash {
            handler.on_error(peer, "block hash does not match the outstanding request".to_string());
            return Err(BlockSyncError::HashMismatch { expected: req.hash, found: hash });
        }

        *self.request.lock() = None;
        *self.request_deadline.lock() = None;
        *self.last_completed.lock() = Some(req);
        self.queue.push(BlockItem { peer, height: req.height, block }).await;
        self.try_request_next(handler);
        Ok(())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Checks whether the outstanding `getdata` request has gone quiet; see
    /// `HeaderSync::check_timeout` for the polling contract this follows.
    pub fn check_timeout(&self, handler: &dyn SyncHandler) -> bool {
        let expired_peer = {
            let deadline = self.request_deadline.lock();
            match *deadline {
                Some((peer, timeout)) if timeout.is_expired() => Some(peer),
                _ => None,
            }
        };
        if let Some(peer) = expired_peer {
            *self.request_deadline.lock() = None;
            *self.request.lock() = None;
            tracing::warn!(target: LOG_TARGET, peer, "block request timed out");
            handler.on_error(peer, "block request timed out".to_string());
            true
        } else {
            false
        }
    }

    pub async fn shutdown(&self) {
        self.queue.stop();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.await;
        }
    }
}

/// Up to the last 11 timestamps of the stable chain ending at `height`,
/// oldest first - `HeaderChain::last_n_timestamps` only ever windows from
/// the tip, which is usually ahead of the block being validated here since
/// headers sync ahead of bodies.
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
    timechain: Arc<RwLock<HeaderTimechain>>,
    sidecar: Arc<ValidationStatusSidecar>,
    params: Arc<ConsensusParams>,
    metrics: Arc<Metrics>,
    queue: BoundedQueue<BlockItem>,
) {
    loop {
        let item = match queue.pop().await {
            QueueOutcome::Item(item) => item,
            QueueOutcome::Stopped => break,
        };
        match validate_item(&timechain, &params, &item) {
            Ok(()) => {
                sidecar.set(item.height, ValidationStatus::StructureValid);
                metrics.record_block_validated();
            }
            Err(err) => {
                tracing::warn!(target: LOG_TARGET, peer = item.peer, height = item.height, %err, "block rejected");
                queue.purge(|other| other.peer == item.peer);
            }
        }
    }
}

fn validate_item(
    timechain: &RwLock<HeaderTimechain>,
    params: &ConsensusParams,
    item: &BlockItem,
) -> Result<(), BlockSyncError> {
    let validator = BlockValidator::new(params);
    validator.validate_structural(&item.block)?;

    let tc = timechain.read();
    let chain = tc.chain();
    if item.height > 0 && chain.get(item.height - 1).is_none() {
        return Err(BlockSyncError::LogicError);
    }

    let ctx = BlockContext {
        height: item.height,
        median_time_past: median_time_past(chain, item.height.saturating_sub(1)),
    };
    validator.validate_contextual(&item.block, &ctx)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::{BlockHeader, HeaderContext};
    use crate::proof_of_work::CompactTarget;
    use crate::transactions::{Input, OutPoint, Output, TransactionBuilder, TransactionData, Witness};
    use std::sync::Mutex as StdMutex;

    struct RecordingHandler {
        requests: StdMutex<Vec<(Peer, SyncRequest)>>,
        errors: StdMutex<Vec<(Peer, String)>>,
        completions: StdMutex<Vec<Peer>>,
    }

    impl RecordingHandler {
        fn new() -> Self {
            RecordingHandler {
                requests: StdMutex::new(Vec::new()),
                errors: StdMutex::new(Vec::new()),
                completions: StdMutex::new(Vec::new()),
            }
        }
    }

    impl SyncHandler for RecordingHandler {
        fn on_request(&self, peer: Peer, message: SyncRequest) {
            self.requests.lock().unwrap().push((peer, message));
        }
        fn on_error(&self, peer: Peer, reason: String) {
            self.errors.lock().unwrap().push((peer, reason));
        }
        fn on_complete(&self, peer: Peer) {
            self.completions.lock().unwrap().push(peer);
        }
    }

    fn easy_header(prev: Hash, timestamp: u32) -> BlockHeader {
        let mut header = BlockHeader {
            version: 4,
            prev_block_hash: prev,
            merkle_root: Hash::ZERO,
            timestamp,
            bits: CompactTarget::from_u32(0x207fffff),
            nonce: 0,
        };
        for n in 0..10_000 {
            header.nonce = n;
            let target = header.bits.expand().unwrap();
            if target.is_satisfied_by(&header.compute_hash()) {
                return header;
            }
        }
        panic!("failed to find a satisfying nonce");
    }

    fn coinbase_block(header: BlockHeader, height: u64) -> Block {
        let mut builder = TransactionData::builder();
        let mut sig_script = vec![height as u8];
        sig_script.extend_from_slice(&[0, 0]);
        builder.push(TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input { previous_output: OutPoint::NULL, script_sig: sig_script, sequence: 0xffffffff }],
            outputs: vec![Output { value: 5_000_000_000, script_pubkey: vec![0x51] }],
            witnesses: vec![Witness::default()],
        });
        let transactions = builder.build();
        let (root, _) = crate::validation::compute_merkle_root(1, |_| transactions.details()[0].txid);
        let mut header = header;
        header.merkle_root = root;
        Block::new(header, transactions, 100, 100)
    }

    fn setup() -> (Arc<RwLock<HeaderTimechain>>, Arc<ConsensusParams>, BlockHeader, BlockHeader) {
        let genesis_header = easy_header(Hash::ZERO, 1_000);
        let genesis = HeaderContext::genesis(genesis_header);
        let next_header = easy_header(genesis.hash, 1_001);
        let mut tc = HeaderTimechain::new(100);
        tc.add(genesis, None).unwrap();
        let next_ctx = genesis.extend(next_header).unwrap();
        tc.add(next_ctx, None).unwrap();
        (Arc::new(RwLock::new(tc)), Arc::new(ConsensusParams::mainnet()), genesis_header, next_header)
    }

    #[tokio::test]
    async fn requests_the_first_sidecar_gap_on_start() {
        let (timechain, params, genesis_header, next_header) = setup();
        let sidecar = Arc::new(ValidationStatusSidecar::new());
        let metrics = Arc::new(Metrics::new());
        let handler = RecordingHandler::new();

        let sync = BlockSync::new(timechain, sidecar, params, metrics, 1 << 20, Duration::from_secs(30));
        sync.start_sync(1, &handler);

        let requests = handler.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, 1);
        assert_eq!(
            requests[0].1,
            SyncRequest::GetData { height: 0, hash: genesis_header.compute_hash() }
        );
        let _ = next_header;
        drop(requests);
        sync.shutdown().await;
    }

    #[tokio::test]
    async fn on_block_rejects_hash_mismatch() {
        let (timechain, params, _genesis_header, _next_header) = setup();
        let sidecar = Arc::new(ValidationStatusSidecar::new());
        let metrics = Arc::new(Metrics::new());
        let handler = RecordingHandler::new();

        let sync = BlockSync::new(timechain, sidecar, params, metrics, 1 << 20, Duration::from_secs(30));
        sync.start_sync(1, &handler);

        let bogus_header = easy_header(Hash::from_bytes([0x11; 32]), 2_000);
        let block = coinbase_block(bogus_header, 0);
        let result = sync.on_block(1, bogus_header.compute_hash(), block, &handler).await;
        assert!(matches!(result, Err(BlockSyncError::HashMismatch { .. })));
        assert_eq!(handler.errors.lock().unwrap().len(), 1);

        sync.shutdown().await;
    }

    #[tokio::test]
    async fn check_timeout_reports_a_quiet_peer_and_clears_the_deadline() {
        let (timechain, params, _genesis_header, _next_header) = setup();
        let sidecar = Arc::new(ValidationStatusSidecar::new());
        let metrics = Arc::new(Metrics::new());
        let handler = RecordingHandler::new();

        let sync = BlockSync::new(timechain, sidecar, params, metrics, 1 << 20, Duration::from_millis(20));
        sync.start_sync(1, &handler);

        assert!(!sync.check_timeout(&handler));
        std::thread::sleep(Duration::from_millis(50));
        assert!(sync.check_timeout(&handler));
        assert_eq!(handler.errors.lock().unwrap().last().map(|(peer, _)| *peer), Some(1));
        assert!(!sync.check_timeout(&handler));

        sync.shutdown().await;
    }
}
