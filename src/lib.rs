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

//! The consensus timechain engine: header tree, block/transaction
//! validation, a sharded UTXO database, and the header/block sync
//! orchestrators that drive them during initial sync.
//!
//! This crate deliberately does not know how to talk to a peer over the
//! wire - it consumes already-parsed [`blocks::BlockHeader`]/[`blocks::Block`]
//! values and reports outcomes through the [`sync::SyncHandler`] trait, so a
//! host binary can plug in whatever transport, peer manager and notification
//! sink it likes.

pub mod bigint;
pub mod blocks;
pub mod chain_storage;
pub mod common;
pub mod consensus;
pub mod hash;
pub mod proof_of_work;
pub mod spend;
pub mod sync;
pub mod transactions;
pub mod utxo;
pub mod validation;
pub mod validation_pipeline;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
