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

use crate::hash::Hash;

#[derive(Debug, thiserror::Error)]
pub enum ChainStorageError {
    #[error("Header with hash `{0}` was not found")]
    HeaderNotFound(Hash),
    #[error("Parent header `{0}` was not found in the chain or the candidate tree")]
    ParentNotFound(Hash),
    #[error("Header `{0}` is already present in the timechain")]
    HeaderAlreadyExists(Hash),
    #[error("Height {requested} is out of range (chain tip is at height {tip})")]
    HeightOutOfRange { requested: u64, tip: u64 },
    #[error("Attempted to add header at height {height} which does not extend its claimed parent")]
    NonContiguousHeight { height: u64 },
    #[error("Invalid parent hint: {0}")]
    InvalidArgument(String),
    #[error("Internal invariant violated: {0}")]
    FatalInvariantViolation(String),
}
