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

use crate::chain_storage::ChainStorageError;
use crate::hash::Hash;
use crate::validation::{BlockError, HeaderError};

/// Everything that can go wrong processing a batch of headers inside
/// `HeaderSync`'s worker (`spec.md` §4.12).
#[derive(Debug, thiserror::Error)]
pub enum BlockHeaderSyncError {
    #[error("header failed validation: {0}")]
    Validation(#[from] HeaderError),
    #[error("timechain storage error: {0}")]
    ChainStorage(#[from] ChainStorageError),
    #[error("batch's parent header `{0}` was not found in the timechain")]
    ParentNotFound(Hash),
    #[error("received a header batch with no `getheaders` request outstanding")]
    UnexpectedBatch,
}

/// Everything that can go wrong processing a block inside `BlockSync`'s
/// worker (`spec.md` §4.13).
#[derive(Debug, thiserror::Error)]
pub enum BlockSyncError {
    #[error("block failed validation: {0}")]
    Validation(#[from] BlockError),
    #[error("timechain storage error: {0}")]
    ChainStorage(#[from] ChainStorageError),
    #[error("received block hash `{found}` does not match the outstanding request `{expected}`")]
    HashMismatch { expected: Hash, found: Hash },
    #[error("received a block with no `getdata` request outstanding")]
    UnexpectedBlock,
    #[error("block's parent header was not found even though it must have already been synced")]
    LogicError,
}
