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

//! The header/block sync orchestrators (`spec.md` §4.12-§4.13) that drive
//! the validators and timechain during initial sync, plus the validation-
//! status sidecar (§5) they publish into.
//!
//! This crate never speaks to a peer directly: [`SyncHandler`] is the seam a
//! host binary implements to plug in its own transport and peer manager.
//! `Peer` is an opaque identifier the host assigns; this crate only ever
//! compares two `Peer`s for equality, to decide whose queued work to purge
//! on a fault.

mod block_sync;
mod error;
mod header_sync;
mod sidecar;

pub use block_sync::{BlockSync, NextBlockRequest};
pub use error::{BlockHeaderSyncError, BlockSyncError};
pub use header_sync::HeaderSync;
pub use sidecar::{ValidationStatus, ValidationStatusSidecar};

/// An opaque, host-assigned peer identifier.
pub type Peer = u64;

/// A message a sync orchestrator asks the host to send to a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncRequest {
    /// `getheaders`: a single-hash locator naming the tip to extend from.
    GetHeaders { locator: crate::hash::Hash },
    /// `getdata` for one block, by height and expected header hash.
    GetData { height: u64, hash: crate::hash::Hash },
}

/// The seam between this crate's sync orchestrators and a host's transport
/// and peer manager (`spec.md` §4.12-§4.13).
pub trait SyncHandler: Send + Sync {
    /// Asks the host to send `message` to `peer`.
    fn on_request(&self, peer: Peer, message: SyncRequest);
    /// A consensus or protocol fault was found in data `peer` sent; the host
    /// should drop the peer and discard any of its queued work.
    fn on_error(&self, peer: Peer, reason: String);
    /// `peer` has nothing further to contribute to the in-progress sync.
    fn on_complete(&self, peer: Peer);
}
