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

//! The 32-bit "bits" encoding of a [`Target`](super::target::Target), following
//! the classic Bitcoin `nBits` scheme: 8 exponent bits, a 23-bit mantissa and
//! a reserved sign bit that must always be clear.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CompactTargetError;
use super::target::Target;
use crate::bigint::BigUint256;

const SIGN_BIT_MASK: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;
const MANTISSA_WITH_SIGN_MASK: u32 = 0x00ff_ffff;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompactTarget(pub u32);

impl CompactTarget {
    pub const fn from_u32(bits: u32) -> Self {
        CompactTarget(bits)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    fn exponent(&self) -> i32 {
        (self.0 >> 24) as i32
    }

    fn mantissa(&self) -> u32 {
        self.0 & MANTISSA_MASK
    }

    fn sign_bit_set(&self) -> bool {
        self.0 & SIGN_BIT_MASK != 0
    }

    /// Decodes this compact encoding into a full 256-bit [`Target`].
    ///
    /// `target = mantissa * 256^(exponent - 3)`.
    pub fn expand(&self) -> Result<Target, CompactTargetError> {
        let mantissa = self.mantissa();
        if mantissa == 0 {
            return Err(CompactTargetError::ZeroMantissa);
        }
        if self.sign_bit_set() {
            return Err(CompactTargetError::NegativeEncoding);
        }
        let exponent = self.exponent();
        if exponent >= 35 {
            return Err(CompactTargetError::Overflow);
        }
        if exponent == 34 && mantissa > 0xFF {
            return Err(CompactTargetError::Overflow);
        }
        if exponent == 33 && mantissa > 0xFFFF {
            return Err(CompactTargetError::Overflow);
        }

        let shift = 8 * (exponent - 3);
        let mantissa = BigUint256::from_u64(mantissa as u64);
        let value = if shift >= 0 {
            mantissa.shl(shift as u32)
        } else {
            mantissa.shr((-shift) as u32)
        };
        Ok(Target::from_biguint256(value))
    }

    /// Encodes a [`Target`] into its compact form, normalizing the 24-bit
    /// mantissa-collision case by shifting one byte right and bumping the
    /// exponent. Lossy: up to 7 low mantissa bits are dropped, but the
    /// round-trip `compress(expand(bits)) == bits` holds for already
    /// normalized `bits`.
    pub fn compress(target: &Target) -> CompactTarget {
        let value = target.as_biguint256();
        let size = value.significant_bytes();
        let mantissa_bits = if size <= 3 {
            value.shl(8 * (3 - size))
        } else {
            value.shr_bytes(size - 3)
        };
        let mut mantissa = (mantissa_bits.words_le()[0] as u32) & MANTISSA_WITH_SIGN_MASK;
        let mut exponent = size;

        if mantissa & SIGN_BIT_MASK != 0 {
            mantissa >>= 8;
            exponent += 1;
        }

        debug_assert_eq!(mantissa & 0xFF80_0000, 0);
        debug_assert!(exponent < 256);

        CompactTarget((exponent << 24) | mantissa)
    }
}

impl fmt::Debug for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompactTarget(0x{:08x})", self.0)
    }
}
