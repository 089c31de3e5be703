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

//! Proof-of-work "work": the expected number of double-SHA256 trials needed
//! to meet a given target. Additive across a chain of headers.

use std::iter::Sum;
use std::ops::Add;

use crate::bigint::BigUint256;

use super::target::Target;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Work(BigUint256);

impl Work {
    pub const ZERO: Work = Work(BigUint256::ZERO);

    /// `work = (~target / (target + 1)) + 1`; a zero target contributes zero
    /// work (it can never be satisfied by a real hash, so it is excluded
    /// from the additive formula rather than producing a divide-by-zero).
    pub fn from_target(target: &Target) -> Work {
        if target.is_zero() {
            return Work::ZERO;
        }
        let value = target.as_biguint256();
        let complement = value.not();
        let denominator = value.wrapping_add(&BigUint256::ONE);
        let quotient = complement
            .checked_div(&denominator)
            .expect("denominator is target + 1, nonzero because target is nonzero");
        Work(quotient.wrapping_add(&BigUint256::ONE))
    }

    pub fn as_biguint256(&self) -> BigUint256 {
        self.0
    }
}

impl Add for Work {
    type Output = Work;

    fn add(self, rhs: Work) -> Work {
        Work(self.0.wrapping_add(&rhs.0))
    }
}

impl Sum for Work {
    fn sum<I: Iterator<Item = Work>>(iter: I) -> Work {
        iter.fold(Work::ZERO, |acc, w| acc + w)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::proof_of_work::compact_target::CompactTarget;

    #[test]
    fn zero_target_has_zero_work() {
        let target = Target::from_biguint256(BigUint256::ZERO);
        assert_eq!(Work::from_target(&target), Work::ZERO);
    }

    #[test]
    fn max_target_has_minimal_nonzero_work() {
        let target = Target::from_biguint256(BigUint256::MAX);
        let work = Work::from_target(&target);
        assert_eq!(work.as_biguint256(), BigUint256::ONE);
    }

    #[test]
    fn work_is_additive() {
        let target = CompactTarget::from_u32(0x1d00ffff).expand().unwrap();
        let w = Work::from_target(&target);
        let sum = w + w;
        assert_eq!(sum.as_biguint256(), w.as_biguint256().wrapping_add(&w.as_biguint256()));
    }

    #[test]
    fn lower_target_yields_more_work() {
        let easy = CompactTarget::from_u32(0x1d00ffff).expand().unwrap();
        let hard = CompactTarget::from_u32(0x1c00ffff).expand().unwrap();
        assert!(Work::from_target(&hard) > Work::from_target(&easy));
    }
}
