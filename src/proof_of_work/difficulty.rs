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

//! Difficulty retarget formula (spec §4.4.1), run only at adjustment-period
//! boundaries; at all other heights the target is inherited unchanged from
//! the previous header (see `examples/original_source/consensus/difficulty_adjustment.h`,
//! whose `IsTransition`-gated formula this mirrors exactly - the corpus
//! contains at least one implementation that inverts that gate, which is
//! the bug called out in spec.md §9's Open Questions; this crate follows
//! the bitcoind-compatible direction).

use crate::bigint::BigUint256;

use super::compact_target::CompactTarget;
use super::target::Target;

pub const ADJUSTMENT_INTERVAL: u64 = 2016;
pub const TARGET_DURATION_SECS: u64 = 14 * 24 * 60 * 60;

pub fn is_retarget_height(height: u64) -> bool {
    height % ADJUSTMENT_INTERVAL == 0
}

/// Computes the expected `bits` for `height`, given the previous header's
/// `bits`/timestamp and the timestamp of the first header of the period
/// ending at `height`. Returns `prev_bits` unchanged off a period boundary.
pub fn expected_bits(
    height: u64,
    prev_bits: CompactTarget,
    period_start_time: u32,
    parent_timestamp: u32,
    pow_limit: &Target,
) -> CompactTarget {
    if !is_retarget_height(height) {
        return prev_bits;
    }

    let raw_duration = parent_timestamp as i64 - period_start_time as i64;
    let min_duration = (TARGET_DURATION_SECS / 4) as i64;
    let max_duration = (TARGET_DURATION_SECS * 4) as i64;
    let period_duration = raw_duration.clamp(min_duration, max_duration) as u64;

    let prev_target = prev_bits
        .expand()
        .expect("a header already accepted onto the timechain has a valid compact target");

    let scaled = prev_target
        .as_biguint256()
        .wrapping_mul_u64(period_duration)
        .checked_div(&BigUint256::from_u64(TARGET_DURATION_SECS))
        .expect("TARGET_DURATION_SECS is a nonzero constant");

    let new_target = Target::from_biguint256(scaled).min(*pow_limit);
    CompactTarget::compress(&new_target)
}
