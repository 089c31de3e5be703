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

//! The three closed error taxonomies of `spec.md` §7: one per validator.

use crate::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("header's prev_block_hash `{found}` does not match parent hash `{expected}`")]
    ParentNotFound { expected: Hash, found: Hash },
    #[error("header hash does not satisfy its claimed proof of work")]
    InvalidProofOfWork,
    #[error("header timestamp is not greater than the median of the last 11 ancestors")]
    BadTimestampTooOld,
    #[error("header timestamp is too far in the future")]
    BadTimestampTooNew,
    #[error("header bits `{found:08x}` do not match the expected retarget value `{expected:08x}`")]
    BadDifficultyTransition { expected: u32, found: u32 },
    #[error("header version `{0}` is invalid at this height")]
    BadVersion(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("transaction has no inputs")]
    EmptyInputs,
    #[error("transaction has no outputs")]
    EmptyOutputs,
    #[error("transaction's non-witness serialized size exceeds the limit")]
    OversizedByteCount,
    #[error("output value `{0}` is negative")]
    NegativeOutputValue(i64),
    #[error("output value `{0}` exceeds the money supply")]
    OversizedOutputValue(i64),
    #[error("sum of output values `{0}` exceeds the money supply")]
    OversizedTotalOutputValues(u64),
    #[error("transaction spends the same previous output more than once")]
    DuplicatedInput,
    #[error("coinbase signature script length `{0}` is outside the allowed 2..=100 range")]
    BadCoinBaseSigScriptSize(usize),
    #[error("non-coinbase transaction has a null previous output")]
    NullPreviousOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("block has no transactions")]
    BadTransactionCount,
    #[error("computed merkle root does not match the header's merkle root, or the tree contains a duplicate sibling pair")]
    BadMerkleRoot,
    #[error("block's non-witness serialized size exceeds the limit")]
    BadSize,
    #[error("block's first transaction is not the unique coinbase")]
    BadCoinBase,
    #[error("transaction at index {index} failed validation: {source}")]
    BadTransaction { index: usize, source: TransactionError },
    #[error("legacy sigop cost `{0}` exceeds the limit")]
    BadSigOpCount(u64),
    #[error("transaction at index {0} is not final at this height")]
    NonFinalTransaction(usize),
    #[error("coinbase signature script does not begin with the minimal push of the block height")]
    BadCoinBaseHeight,
    #[error("coinbase witness reserved value is missing or malformed")]
    BadWitnessNonce,
    #[error("witness commitment does not match the computed witness merkle root")]
    BadWitnessMerkle,
    #[error("block carries witness data but declares no witness commitment")]
    UnexpectedWitness,
    #[error("block weight `{0}` exceeds the maximum")]
    BadBlockWeight(u64),
    #[error("input references an output that is not unspent")]
    NotUnspent,
    #[error("input spends an immature coinbase output")]
    CoinbaseNotMature,
}
