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

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BigUintError {
    #[error("division by zero")]
    DivisionByZero,
}

/// A fixed 256-bit unsigned integer, stored as four 64-bit words in
/// little-endian word order (`words[0]` is the least significant word).
///
/// This mirrors `arith_uint256`-style helpers found throughout the corpus:
/// a minimal, allocation-free big integer sized exactly for proof-of-work
/// target/work arithmetic, not a general-purpose bignum.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct BigUint256 {
    words: [u64; 4],
}

impl BigUint256 {
    pub const ZERO: BigUint256 = BigUint256 { words: [0; 4] };
    pub const ONE: BigUint256 = BigUint256 { words: [1, 0, 0, 0] };
    pub const MAX: BigUint256 = BigUint256 {
        words: [u64::MAX; 4],
    };

    pub const fn from_u64(value: u64) -> Self {
        BigUint256 {
            words: [value, 0, 0, 0],
        }
    }

    pub const fn from_words_le(words: [u64; 4]) -> Self {
        BigUint256 { words }
    }

    pub fn words_le(&self) -> [u64; 4] {
        self.words
    }

    /// Interprets a 32-byte buffer as a little-endian 256-bit integer.
    pub fn from_le_bytes(bytes: &[u8; 32]) -> Self {
        let mut words = [0u64; 4];
        for (i, word) in words.iter_mut().enumerate() {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            *word = u64::from_le_bytes(buf);
        }
        BigUint256 { words }
    }

    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, word) in self.words.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of bytes needed to represent this value with no leading zero
    /// byte (0 for a zero value). Used by `CompactTarget::compress`.
    pub fn significant_bytes(&self) -> u32 {
        for i in (0..4).rev() {
            let word = self.words[i];
            if word != 0 {
                let word_bytes = 8 - (word.leading_zeros() / 8);
                return (i as u32) * 8 + word_bytes;
            }
        }
        0
    }

    /// Bitwise complement (`!self`).
    pub fn not(&self) -> BigUint256 {
        let mut words = self.words;
        for w in words.iter_mut() {
            *w = !*w;
        }
        BigUint256 { words }
    }

    /// Wrapping addition.
    pub fn wrapping_add(&self, rhs: &BigUint256) -> BigUint256 {
        let mut words = [0u64; 4];
        let mut carry = 0u128;
        for i in 0..4 {
            let sum = self.words[i] as u128 + rhs.words[i] as u128 + carry;
            words[i] = sum as u64;
            carry = sum >> 64;
        }
        BigUint256 { words }
    }

    /// Wrapping subtraction.
    pub fn wrapping_sub(&self, rhs: &BigUint256) -> BigUint256 {
        let mut words = [0u64; 4];
        let mut borrow = 0i128;
        for i in 0..4 {
            let diff = self.words[i] as i128 - rhs.words[i] as i128 - borrow;
            if diff < 0 {
                words[i] = (diff + (1i128 << 64)) as u64;
                borrow = 1;
            } else {
                words[i] = diff as u64;
                borrow = 0;
            }
        }
        BigUint256 { words }
    }

    /// Logical left shift by `bits` (0..=255 is meaningful; larger shifts
    /// yield zero). Bits shifted out of word 3 are discarded (this type has
    /// no overflow detection; callers that need it check magnitude first).
    pub fn shl(&self, bits: u32) -> BigUint256 {
        if bits >= 256 {
            return BigUint256::ZERO;
        }
        let word_shift = (bits / 64) as usize;
        let bit_shift = bits % 64;
        let mut words = [0u64; 4];
        for i in (0..4).rev() {
            if i < word_shift {
                continue;
            }
            let src = i - word_shift;
            let mut value = self.words[src] << bit_shift;
            if bit_shift != 0 && src > 0 {
                value |= self.words[src - 1] >> (64 - bit_shift);
            }
            words[i] = value;
        }
        BigUint256 { words }
    }

    /// Logical right shift by `bits`.
    pub fn shr(&self, bits: u32) -> BigUint256 {
        if bits >= 256 {
            return BigUint256::ZERO;
        }
        let word_shift = (bits / 64) as usize;
        let bit_shift = bits % 64;
        let mut words = [0u64; 4];
        for i in 0..4 {
            let src = i + word_shift;
            if src >= 4 {
                continue;
            }
            let mut value = self.words[src] >> bit_shift;
            if bit_shift != 0 && src + 1 < 4 {
                value |= self.words[src + 1] << (64 - bit_shift);
            }
            words[i] = value;
        }
        BigUint256 { words }
    }

    /// Right-shift by a whole number of bytes (used by `CompactTarget::compress`).
    pub fn shr_bytes(&self, bytes: u32) -> BigUint256 {
        self.shr(bytes * 8)
    }

    /// Long division. Returns `DivisionByZero` if `divisor` is zero.
    pub fn checked_div(&self, divisor: &BigUint256) -> Result<BigUint256, BigUintError> {
        if divisor.is_zero() {
            return Err(BigUintError::DivisionByZero);
        }
        if *self < *divisor {
            return Ok(BigUint256::ZERO);
        }
        // Simple binary long division: schoolbook bit-at-a-time, adequate
        // for the 256-bit, non-hot-path divisions this type performs
        // (compact-target work calculations, difficulty ratios).
        let mut quotient = BigUint256::ZERO;
        let mut remainder = BigUint256::ZERO;
        for bit in (0..256).rev() {
            remainder = remainder.shl(1);
            if self.bit(bit) {
                remainder = remainder.wrapping_add(&BigUint256::ONE);
            }
            if remainder >= *divisor {
                remainder = remainder.wrapping_sub(divisor);
                quotient = quotient.set_bit(bit);
            }
        }
        Ok(quotient)
    }

    /// Multiplies by a `u32`, saturating is not performed: callers only ever
    /// multiply by small clamp factors where the product is known to fit,
    /// per the proof-of-work retarget formula in `proof_of_work::difficulty`.
    pub fn wrapping_mul_u64(&self, rhs: u64) -> BigUint256 {
        let mut words = [0u64; 4];
        let mut carry = 0u128;
        for i in 0..4 {
            let product = self.words[i] as u128 * rhs as u128 + carry;
            words[i] = product as u64;
            carry = product >> 64;
        }
        BigUint256 { words }
    }

    fn bit(&self, index: u32) -> bool {
        let word = (index / 64) as usize;
        let offset = index % 64;
        (self.words[word] >> offset) & 1 == 1
    }

    fn set_bit(&self, index: u32) -> BigUint256 {
        let mut words = self.words;
        let word = (index / 64) as usize;
        let offset = index % 64;
        words[word] |= 1u64 << offset;
        BigUint256 { words }
    }
}

impl PartialOrd for BigUint256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigUint256 {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..4).rev() {
            match self.words[i].cmp(&other.words[i]) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Debug for BigUint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigUint256(0x")?;
        for word in self.words.iter().rev() {
            write!(f, "{:016x}", word)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordering_is_total_and_word_major() {
        let a = BigUint256::from_u64(5);
        let b = BigUint256::from_words_le([0, 1, 0, 0]);
        assert!(a < b);
    }

    #[test]
    fn wrapping_add_carries_across_words() {
        let a = BigUint256::from_words_le([u64::MAX, 0, 0, 0]);
        let b = BigUint256::from_u64(1);
        let sum = a.wrapping_add(&b);
        assert_eq!(sum.words_le(), [0, 1, 0, 0]);
    }

    #[test]
    fn wrapping_sub_underflow_borrows_across_words() {
        let a = BigUint256::from_words_le([0, 1, 0, 0]);
        let b = BigUint256::from_u64(1);
        let diff = a.wrapping_sub(&b);
        assert_eq!(diff.words_le(), [u64::MAX, 0, 0, 0]);
    }

    #[test]
    fn shift_round_trips_small_values() {
        let a = BigUint256::from_u64(0xABCD);
        let shifted = a.shl(16).shr(16);
        assert_eq!(shifted, a);
    }

    #[test]
    fn division_by_zero_is_rejected() {
        let a = BigUint256::from_u64(10);
        assert_eq!(
            a.checked_div(&BigUint256::ZERO),
            Err(BigUintError::DivisionByZero)
        );
    }

    #[test]
    fn division_matches_grade_school_arithmetic() {
        let a = BigUint256::from_u64(100);
        let b = BigUint256::from_u64(7);
        assert_eq!(a.checked_div(&b).unwrap(), BigUint256::from_u64(14));
    }

    #[test]
    fn significant_bytes_of_zero_is_zero() {
        assert_eq!(BigUint256::ZERO.significant_bytes(), 0);
    }

    #[test]
    fn significant_bytes_counts_top_nonzero_byte() {
        let value = BigUint256::from_u64(0x00FF_0000);
        assert_eq!(value.significant_bytes(), 3);
    }
}
