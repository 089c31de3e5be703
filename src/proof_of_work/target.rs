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

//! A 256-bit proof-of-work target: the upper bound a candidate block hash
//! (interpreted as a little-endian integer) must not exceed.

use crate::bigint::BigUint256;
use crate::hash::Hash;

use super::compact_target::CompactTarget;

/// The protocol maximum target, i.e. the easiest allowed difficulty
/// (`0x1d00ffff` expanded).
pub fn protocol_max_target() -> Target {
    CompactTarget::from_u32(0x1d00ffff)
        .expand()
        .expect("protocol maximum compact target is always valid")
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Target(BigUint256);

impl Target {
    pub fn from_biguint256(value: BigUint256) -> Self {
        Target(value)
    }

    pub fn as_biguint256(&self) -> BigUint256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` iff `hash`, read as a little-endian integer, does not
    /// exceed this target - the proof-of-work condition.
    pub fn is_satisfied_by(&self, hash: &Hash) -> bool {
        hash.to_biguint256() <= self.0
    }

    pub fn min(self, other: Target) -> Target {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn genesis_header_satisfies_protocol_max_target() {
        let target = protocol_max_target();
        let hash: Hash = {
            // 000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26, displayed (reversed) hex
            let display_hex = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26";
            let mut bytes = hex::decode(display_hex).unwrap();
            bytes.reverse();
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            Hash::from_bytes(arr)
        };
        assert!(target.is_satisfied_by(&hash));
    }
}
