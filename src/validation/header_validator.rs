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

//! Header validation: the consensus rule set applied to one candidate
//! header given its parent and a [`ValidationView`] of its ancestry
//! (`spec.md` §4.4).

use crate::blocks::{BlockHeader, HeaderContext};
use crate::chain_storage::ValidationView;
use crate::consensus::ConsensusParams;
use crate::proof_of_work::{expected_bits, is_retarget_height};

use super::error::HeaderError;

const LOG_TARGET: &str = "tc::validation::header";

pub struct HeaderValidator<'a> {
    params: &'a ConsensusParams,
}

impl<'a> HeaderValidator<'a> {
    pub fn new(params: &'a ConsensusParams) -> Self {
        HeaderValidator { params }
    }

    /// Validates `header` given its `parent` context and a view of the chain
    /// it would extend. `now` is the current wall-clock time in seconds,
    /// threaded through explicitly so callers (and tests) do not depend on
    /// the system clock.
    pub fn validate(
        &self,
        header: &BlockHeader,
        parent: &HeaderContext,
        view: &ValidationView<'_>,
        now: u32,
    ) -> Result<(), HeaderError> {
        if parent.hash != header.prev_block_hash {
            return Err(HeaderError::ParentNotFound {
                expected: parent.hash,
                found: header.prev_block_hash,
            });
        }

        let target = header.bits.expand().map_err(|_| HeaderError::InvalidProofOfWork)?;
        let hash = header.compute_hash();
        if !target.is_satisfied_by(&hash) {
            return Err(HeaderError::InvalidProofOfWork);
        }

        let height = parent.height + 1;
        let expected = if is_retarget_height(height) {
            let period_start = view
                .timestamp_at(height.saturating_sub(self.params.adjustment_interval))
                .unwrap_or(parent.header.timestamp);
            expected_bits(height, parent.header.bits, period_start, parent.header.timestamp, &self.params.pow_limit)
        } else {
            parent.header.bits
        };
        if expected.as_u32() != header.bits.as_u32() {
            return Err(HeaderError::BadDifficultyTransition {
                expected: expected.as_u32(),
                found: header.bits.as_u32(),
            });
        }

        let window = view.last_n_timestamps(self.params.blocks_for_median_time);
        if let Some(median) = median_timestamp(&window) {
            if header.timestamp <= median {
                return Err(HeaderError::BadTimestampTooOld);
            }
        }
        if header.timestamp > now.saturating_add(self.params.timestamp_tolerance_secs) {
            return Err(HeaderError::BadTimestampTooNew);
        }

        check_version(header.version, height, self.params)?;

        tracing::trace!(target: LOG_TARGET, height, hash = %hash, "header passed validation");
        Ok(())
    }
}

fn check_version(version: i32, height: u64, params: &ConsensusParams) -> Result<(), HeaderError> {
    if version < 0 {
        return Err(HeaderError::BadVersion(version));
    }
    if (version == 0 || version == 1) && params.bip34_active(height) {
        return Err(HeaderError::BadVersion(version));
    }
    if version == 2 && params.bip66_active(height) {
        return Err(HeaderError::BadVersion(version));
    }
    if version == 3 && params.bip65_active(height) {
        return Err(HeaderError::BadVersion(version));
    }
    Ok(())
}

/// The median of an odd- or even-sized window, following the conventional
/// "middle element of the sorted window" MTP definition (`spec.md`'s
/// `blocks_for_median_time` is always odd in practice, but this holds for
/// any non-empty window).
fn median_timestamp(window: &[u32]) -> Option<u32> {
    if window.is_empty() {
        return None;
    }
    let mut sorted = window.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain_storage::HeaderTimechain;
    use crate::hash::Hash;
    use crate::proof_of_work::CompactTarget;

    fn header(prev: Hash, timestamp: u32, nonce: u32) -> BlockHeader {
        BlockHeader {
            version: 4,
            prev_block_hash: prev,
            merkle_root: Hash::ZERO,
            timestamp,
            bits: CompactTarget::from_u32(0x207fffff),
            nonce,
        }
    }

    fn easy_work_header(prev: Hash, timestamp: u32) -> BlockHeader {
        // 0x207fffff is the easiest regtest-style target: almost any nonce
        // satisfies it, so tests don't need real mining.
        let mut candidate = header(prev, timestamp, 0);
        for nonce in 0..10_000u32 {
            candidate.nonce = nonce;
            let target = candidate.bits.expand().unwrap();
            if target.is_satisfied_by(&candidate.compute_hash()) {
                return candidate;
            }
        }
        panic!("failed to find a satisfying nonce at minimal difficulty");
    }

    #[test]
    fn mtp_rule_rejects_equal_and_accepts_greater_timestamp() {
        let params = ConsensusParams::mainnet();
        let validator = HeaderValidator::new(&params);

        let mut tc = HeaderTimechain::new(100);
        let genesis_header = easy_work_header(Hash::ZERO, 1_000);
        let genesis = HeaderContext::genesis(genesis_header);
        tc.add(genesis, None).unwrap();

        let mut parent = genesis;
        for i in 1..11u32 {
            let h = easy_work_header(parent.hash, 1_000 + i);
            let ctx = parent.extend(h).unwrap();
            tc.add(ctx, None).unwrap();
            parent = ctx;
        }

        let view = tc.validation_view(tc.find(&parent.hash).unwrap());
        let window = view.last_n_timestamps(11);
        let median = median_timestamp(&window).unwrap();

        let equal_to_median = easy_work_header(parent.hash, median);
        assert_eq!(
            validator.validate(&equal_to_median, &parent, &view, median + 10_000),
            Err(HeaderError::BadTimestampTooOld)
        );

        let greater_than_median = easy_work_header(parent.hash, median + 1);
        assert!(validator.validate(&greater_than_median, &parent, &view, median + 10_000).is_ok());
    }

    #[test]
    fn mismatched_parent_hash_is_rejected() {
        let params = ConsensusParams::mainnet();
        let validator = HeaderValidator::new(&params);
        let mut tc = HeaderTimechain::new(100);
        let genesis = HeaderContext::genesis(easy_work_header(Hash::ZERO, 1_000));
        tc.add(genesis, None).unwrap();
        let view = tc.validation_view(tc.find(&genesis.hash).unwrap());

        let mut wrong_parent = easy_work_header(genesis.hash, 1_001);
        wrong_parent.prev_block_hash = Hash::from_bytes([0xAB; 32]);
        assert!(matches!(
            validator.validate(&wrong_parent, &genesis, &view, 1_001),
            Err(HeaderError::ParentNotFound { .. })
        ));
    }

    #[test]
    fn future_timestamp_beyond_tolerance_is_rejected() {
        let params = ConsensusParams::mainnet();
        let validator = HeaderValidator::new(&params);
        let mut tc = HeaderTimechain::new(100);
        let genesis = HeaderContext::genesis(easy_work_header(Hash::ZERO, 1_000));
        tc.add(genesis, None).unwrap();
        let view = tc.validation_view(tc.find(&genesis.hash).unwrap());

        let far_future = easy_work_header(genesis.hash, 1_000 + params.timestamp_tolerance_secs + 100);
        assert_eq!(
            validator.validate(&far_future, &genesis, &view, 1_000),
            Err(HeaderError::BadTimestampTooNew)
        );
    }
}
