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

//! Structural, contextual and spending block rules (`spec.md` §4.6).

use crate::blocks::Block;
use crate::consensus::ConsensusParams;
use crate::transactions::TransactionDetail;

use super::error::{BlockError, TransactionError};
use super::merkle::compute_merkle_root;
use super::sigops::count_sigops;
use super::transaction_validator::TransactionValidator;

const LOG_TARGET: &str = "tc::validation::block";

const WITNESS_COMMITMENT_HEADER: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];

/// Ancestry a contextual check needs beyond the block itself.
pub struct BlockContext {
    pub height: u64,
    pub median_time_past: u32,
}

/// A resolved funding output for one non-coinbase input, as produced by the
/// spend-joining machinery (`spec.md` §4.11) and consumed here by the
/// spending rules.
pub struct FundingOutput {
    pub funding_height: u64,
    pub is_coinbase: bool,
    pub amount: u64,
}

/// Anything that can answer "what funds this input", abstracting over the
/// concrete join mechanism (`SpendJoiner` in production, a plain map in
/// tests) so this validator does not depend on the UTXO module's storage
/// details.
pub trait SpendingView {
    fn funding_output(&self, input_index: usize) -> Option<&FundingOutput>;
}

pub struct BlockValidator<'a> {
    params: &'a ConsensusParams,
}

impl<'a> BlockValidator<'a> {
    pub fn new(params: &'a ConsensusParams) -> Self {
        BlockValidator { params }
    }

    /// Rules that need only the block itself: tx count, Merkle root,
    /// non-witness size, unique coinbase, per-tx structural rules, sigop
    /// cost.
    pub fn validate_structural(&self, block: &Block) -> Result<(), BlockError> {
        let details = block.transactions.details();
        if details.is_empty() {
            return Err(BlockError::BadTransactionCount);
        }

        let (root, unique) = compute_merkle_root(details.len(), |i| details[i].txid);
        if !unique || root != block.header.merkle_root {
            return Err(BlockError::BadMerkleRoot);
        }

        if block.serialized_bytes() > self.params.max_tx_weight_bytes {
            return Err(BlockError::BadSize);
        }

        if !details[0].is_coinbase(&block.transactions) {
            return Err(BlockError::BadCoinBase);
        }
        if details.iter().skip(1).any(|d| d.is_coinbase(&block.transactions)) {
            return Err(BlockError::BadCoinBase);
        }

        let tx_validator = TransactionValidator::new(self.params);
        for (index, detail) in details.iter().enumerate() {
            tx_validator
                .validate(&block.transactions, detail)
                .map_err(|source| BlockError::BadTransaction { index, source })?;
        }

        let mut sigop_count = 0u64;
        for detail in details {
            for input in block.transactions.inputs(detail) {
                sigop_count += count_sigops(&input.script_sig);
            }
            for output in block.transactions.outputs(detail) {
                sigop_count += count_sigops(&output.script_pubkey);
            }
        }
        if sigop_count * self.params.witness_scale_factor > self.params.max_block_sigops_cost {
            return Err(BlockError::BadSigOpCount(sigop_count * self.params.witness_scale_factor));
        }

        Ok(())
    }

    /// Rules that need the block's height and ancestry: finality, BIP34
    /// coinbase height push, BIP141 witness commitment, weight.
    pub fn validate_contextual(&self, block: &Block, ctx: &BlockContext) -> Result<(), BlockError> {
        let details = block.transactions.details();

        let locktime_cutoff = if self.params.bip113_active(ctx.height) {
            ctx.median_time_past
        } else {
            block.header.timestamp
        };
        for (index, detail) in details.iter().enumerate() {
            if !is_final(block, detail, ctx.height, locktime_cutoff) {
                return Err(BlockError::NonFinalTransaction(index));
            }
        }

        if self.params.bip34_active(ctx.height) {
            let coinbase = &details[0];
            let sig_script = &block.transactions.inputs(coinbase)[0].script_sig;
            let expected = minimal_push_height(ctx.height);
            if sig_script.len() < expected.len() || sig_script[..expected.len()] != expected[..] {
                return Err(BlockError::BadCoinBaseHeight);
            }
        }

        self.validate_witness_commitment(block)?;

        if block.weight_units() > self.params.max_block_weight {
            return Err(BlockError::BadBlockWeight(block.weight_units()));
        }

        tracing::debug!(target: LOG_TARGET, height = ctx.height, "block passed contextual validation");
        Ok(())
    }

    fn validate_witness_commitment(&self, block: &Block) -> Result<(), BlockError> {
        let details = block.transactions.details();
        let coinbase = &details[0];
        let has_witness = details.iter().any(|d| d.is_witness(&block.transactions));

        let commitment_output = block
            .transactions
            .outputs(coinbase)
            .iter()
            .rev()
            .find(|o| o.script_pubkey.len() >= 38 && o.script_pubkey[0..6] == WITNESS_COMMITMENT_HEADER);

        match commitment_output {
            None => {
                if has_witness {
                    return Err(BlockError::UnexpectedWitness);
                }
                Ok(())
            }
            Some(output) => {
                let commitment = &output.script_pubkey[6..38];
                let witnesses = block.transactions.witnesses(coinbase);
                let reserved = witnesses
                    .first()
                    .filter(|w| w.items.len() == 1 && w.items[0].len() == 32)
                    .map(|w| w.items[0].clone())
                    .ok_or(BlockError::BadWitnessNonce)?;

                let (witness_root, _) = compute_merkle_root(details.len(), |i| {
                    if i == 0 {
                        crate::hash::Hash::ZERO
                    } else {
                        details[i].wtxid
                    }
                });
                let mut buf = [0u8; 64];
                buf[0..32].copy_from_slice(witness_root.as_bytes());
                buf[32..64].copy_from_slice(&reserved);
                let expected = crate::hash::double_sha256(&buf);
                if expected.as_bytes() != commitment {
                    return Err(BlockError::BadWitnessMerkle);
                }
                Ok(())
            }
        }
    }

    /// The spending rules (`spec.md` §4.6 "Spending"): every non-coinbase
    /// input must resolve to an unspent, mature funding output. `view` is
    /// produced by a completed `SpendJoiner` and indexes funding outputs by
    /// the input's position among the block's non-coinbase inputs, in block
    /// order.
    pub fn validate_spending(&self, view: &dyn SpendingView, input_count: usize, height: u64) -> Result<(), BlockError> {
        for i in 0..input_count {
            let funding = view.funding_output(i).ok_or(BlockError::NotUnspent)?;
            if funding.is_coinbase && funding.funding_height + self.params.coinbase_maturity > height {
                return Err(BlockError::CoinbaseNotMature);
            }
        }
        Ok(())
    }
}

fn is_final(block: &Block, detail: &TransactionDetail, height: u64, locktime_cutoff: u32) -> bool {
    if detail.lock_time == 0 {
        return true;
    }
    let threshold = if detail.lock_time < 500_000_000 {
        height as u32
    } else {
        locktime_cutoff
    };
    if detail.lock_time < threshold {
        return true;
    }
    block.transactions.inputs(detail).iter().all(|i| i.sequence == 0xFFFFFFFF)
}

fn script_num_bytes(value: u64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let mut absvalue = value;
    let mut out = Vec::new();
    while absvalue > 0 {
        out.push((absvalue & 0xff) as u8);
        absvalue >>= 8;
    }
    if out.last().copied().unwrap_or(0) & 0x80 != 0 {
        out.push(0);
    }
    out
}

/// The minimal-push encoding of `height`, per BIP34: a plain data push
/// opcode (length byte, or `OP_PUSHDATA1`/`2` for longer encodings) followed
/// by the little-endian script-number bytes.
fn minimal_push_height(height: u64) -> Vec<u8> {
    let num = script_num_bytes(height);
    let mut out = Vec::with_capacity(num.len() + 2);
    if num.len() <= 75 {
        out.push(num.len() as u8);
    } else if num.len() <= 255 {
        out.push(0x4c);
        out.push(num.len() as u8);
    } else {
        out.push(0x4d);
        out.extend_from_slice(&(num.len() as u16).to_le_bytes());
    }
    out.extend(num);
    out
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
            version: 4,
            prev_block_hash: Hash::ZERO,
            merkle_root: Hash::ZERO,
            timestamp: 1_700_000_000,
            bits: CompactTarget::from_u32(0x1d00ffff),
            nonce: 0,
        }
    }

    fn coinbase(sig_script: Vec<u8>) -> TransactionBuilder {
        TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input { previous_output: OutPoint::NULL, script_sig: sig_script, sequence: 0xffffffff }],
            outputs: vec![Output { value: 50_0000_0000, script_pubkey: vec![0x51] }],
            witnesses: vec![Witness::default()],
        }
    }

    fn build_block(coinbase_script: Vec<u8>) -> Block {
        let mut builder = TransactionData::builder();
        builder.push(coinbase(coinbase_script));
        let data = builder.build();
        let mut h = header();
        let (root, _) = compute_merkle_root(data.len(), |i| data.details()[i].txid);
        h.merkle_root = root;
        Block::new(h, data, 200, 200)
    }

    #[test]
    fn single_coinbase_block_passes_structural_rules() {
        let block = build_block(vec![0x51, 0x51]);
        let params = ConsensusParams::mainnet();
        assert!(BlockValidator::new(&params).validate_structural(&block).is_ok());
    }

    #[test]
    fn merkle_root_mismatch_is_rejected() {
        let mut block = build_block(vec![0x51, 0x51]);
        let header_mut = &mut block.header;
        header_mut.merkle_root = Hash::from_bytes([0xFF; 32]);
        let params = ConsensusParams::mainnet();
        assert_eq!(
            BlockValidator::new(&params).validate_structural(&block),
            Err(BlockError::BadMerkleRoot)
        );
    }

    #[test]
    fn bip34_height_push_is_checked() {
        let params = ConsensusParams::mainnet();
        let height = params.bip34_activation_height + 10;
        let expected = minimal_push_height(height);
        let block = build_block(expected);
        let ctx = BlockContext { height, median_time_past: header().timestamp };
        assert!(BlockValidator::new(&params).validate_contextual(&block, &ctx).is_ok());
    }

    #[test]
    fn wrong_bip34_height_push_is_rejected() {
        let params = ConsensusParams::mainnet();
        let height = params.bip34_activation_height + 10;
        let wrong = minimal_push_height(height + 1);
        let block = build_block(wrong);
        let ctx = BlockContext { height, median_time_past: header().timestamp };
        assert_eq!(
            BlockValidator::new(&params).validate_contextual(&block, &ctx),
            Err(BlockError::BadCoinBaseHeight)
        );
    }

    #[test]
    fn witness_tx_without_commitment_is_rejected() {
        let mut builder = TransactionData::builder();
        builder.push(coinbase(vec![0x51, 0x51]));
        builder.push(TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input {
                previous_output: OutPoint { txid: Hash::from_bytes([5; 32]), index: 0 },
                script_sig: vec![],
                sequence: 0xffffffff,
            }],
            outputs: vec![Output { value: 1, script_pubkey: vec![0x51] }],
            witnesses: vec![Witness { items: vec![vec![1, 2, 3]] }],
        });
        let data = builder.build();
        let mut h = header();
        let (root, _) = compute_merkle_root(data.len(), |i| data.details()[i].txid);
        h.merkle_root = root;
        let block = Block::new(h, data, 300, 320);

        let params = ConsensusParams::mainnet();
        assert_eq!(
            BlockValidator::new(&params).validate_witness_commitment(&block),
            Err(BlockError::UnexpectedWitness)
        );
    }
}
