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

//! Consensus-critical constants ([`ConsensusParams`]) and operational
//! tuning knobs ([`EngineConfig`]), kept as two separate structs the way
//! `tari_core` splits `ConsensusConstants` (protocol law) from its
//! operational `*Config` structs (queue sizes, worker counts) - mixing
//! the two would make it too easy to accidentally thread a tunable knob
//! into a consensus rule.

use std::time::Duration;

use crate::proof_of_work::{protocol_max_target, Target};

/// Protocol-defined constants that every node on a given network must agree
/// on bit-for-bit. Changing any of these changes consensus.
#[derive(Clone, Debug)]
pub struct ConsensusParams {
    pub adjustment_interval: u64,
    pub target_duration_secs: u64,
    pub pow_limit: Target,
    pub blocks_for_median_time: usize,
    pub timestamp_tolerance_secs: u32,
    pub satoshis_per_coin: u64,
    pub money_supply: u64,
    pub max_block_weight: u64,
    pub max_block_sigops_cost: u64,
    pub coinbase_maturity: u64,
    pub witness_scale_factor: u64,
    pub max_tx_weight_bytes: u64,
    pub bip34_activation_height: u64,
    pub bip65_activation_height: u64,
    pub bip66_activation_height: u64,
    pub bip113_activation_height: u64,
    pub bip141_activation_height: u64,
}

impl ConsensusParams {
    /// Mainnet constants, per `spec.md` §6.
    pub fn mainnet() -> Self {
        let satoshis_per_coin = 100_000_000;
        ConsensusParams {
            adjustment_interval: 2016,
            target_duration_secs: 14 * 24 * 60 * 60,
            pow_limit: protocol_max_target(),
            blocks_for_median_time: 11,
            timestamp_tolerance_secs: 2 * 60 * 60,
            satoshis_per_coin,
            money_supply: 21_000_000 * satoshis_per_coin,
            max_block_weight: 4_000_000,
            max_block_sigops_cost: 80_000,
            coinbase_maturity: 100,
            witness_scale_factor: 4,
            max_tx_weight_bytes: 1_000_000,
            bip34_activation_height: 227_931,
            bip65_activation_height: 388_381,
            bip66_activation_height: 363_725,
            bip113_activation_height: 419_328,
            bip141_activation_height: 481_824,
        }
    }

    pub fn is_retarget_height(&self, height: u64) -> bool {
        height % self.adjustment_interval == 0
    }

    pub fn bip34_active(&self, height: u64) -> bool {
        height >= self.bip34_activation_height
    }

    pub fn bip65_active(&self, height: u64) -> bool {
        height >= self.bip65_activation_height
    }

    pub fn bip66_active(&self, height: u64) -> bool {
        height >= self.bip66_activation_height
    }

    pub fn bip113_active(&self, height: u64) -> bool {
        height >= self.bip113_activation_height
    }

    pub fn bip141_active(&self, height: u64) -> bool {
        height >= self.bip141_activation_height
    }
}

/// Operational knobs that tune resource usage but carry no consensus
/// meaning - two honest nodes may run with different values of these and
/// still agree on the chain.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Byte budget for the block-sync queue (`spec.md` §4.13).
    pub max_queue_bytes: u64,
    /// How far behind the chain tip a tree branch may fall before it is
    /// pruned (`spec.md` §4.3's `max_keep_depth`).
    pub max_keep_depth: u64,
    /// Number of runs a `MemoryAge` accumulates before it becomes
    /// compaction-ready (`spec.md` §4.9's fan-in `N`).
    pub memory_age_fan_in: usize,
    /// Bit width of the prefix used to build a `MemoryRun`'s bucket
    /// directory (`spec.md` §4.8).
    pub bucket_directory_bits: u32,
    /// Worker-pool size for `SpendPipeline`.
    pub spend_pipeline_workers: usize,
    /// Worker-pool size for `ValidationPipeline`.
    pub validation_pipeline_workers: usize,
    /// Worker-pool size for the UTXO index's background compactor.
    pub compactor_workers: usize,
    /// Wire maximum headers-per-batch, used by `HeaderSync` to detect a
    /// possibly-incomplete final batch (`spec.md` §4.12).
    pub max_headers_per_batch: usize,
    /// How long a sync may wait for a peer's response before treating it as
    /// unresponsive.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_queue_bytes: 16 * 1024 * 1024,
            max_keep_depth: 100,
            memory_age_fan_in: 4,
            bucket_directory_bits: 12,
            spend_pipeline_workers: 4,
            validation_pipeline_workers: 4,
            compactor_workers: 1,
            max_headers_per_batch: 2000,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mainnet_retarget_height_matches_adjustment_interval() {
        let params = ConsensusParams::mainnet();
        assert!(params.is_retarget_height(0));
        assert!(params.is_retarget_height(2016));
        assert!(!params.is_retarget_height(2015));
    }

    #[test]
    fn bip_activation_checks_are_inclusive() {
        let params = ConsensusParams::mainnet();
        assert!(params.bip34_active(params.bip34_activation_height));
        assert!(!params.bip34_active(params.bip34_activation_height - 1));
    }

    #[test]
    fn engine_config_defaults_match_spec_numbers() {
        let config = EngineConfig::default();
        assert_eq!(config.max_queue_bytes, 16 * 1024 * 1024);
        assert_eq!(config.max_headers_per_batch, 2000);
    }
}
