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

//! Per-transaction structural validation (`spec.md` §4.5), run against a
//! transaction's view into its parent block's [`TransactionData`] arena.

use std::collections::HashSet;

use crate::consensus::ConsensusParams;
use crate::transactions::{OutPoint, TransactionData, TransactionDetail};

use super::error::TransactionError;

pub struct TransactionValidator<'a> {
    params: &'a ConsensusParams,
}

impl<'a> TransactionValidator<'a> {
    pub fn new(params: &'a ConsensusParams) -> Self {
        TransactionValidator { params }
    }

    pub fn validate(&self, data: &TransactionData, detail: &TransactionDetail) -> Result<(), TransactionError> {
        let inputs = data.inputs(detail);
        let outputs = data.outputs(detail);

        if inputs.is_empty() {
            return Err(TransactionError::EmptyInputs);
        }
        if outputs.is_empty() {
            return Err(TransactionError::EmptyOutputs);
        }
        if non_witness_size(detail, inputs, outputs) > self.params.max_tx_weight_bytes {
            return Err(TransactionError::OversizedByteCount);
        }

        let money_supply = self.params.money_supply as i64;
        let mut total: u64 = 0;
        for output in outputs {
            let value = output.value as i64;
            if value < 0 {
                return Err(TransactionError::NegativeOutputValue(value));
            }
            if value > money_supply {
                return Err(TransactionError::OversizedOutputValue(value));
            }
            total = total.checked_add(output.value).ok_or(TransactionError::OversizedTotalOutputValues(u64::MAX))?;
        }
        if total > self.params.money_supply {
            return Err(TransactionError::OversizedTotalOutputValues(total));
        }

        let mut seen: HashSet<OutPoint> = HashSet::with_capacity(inputs.len());
        for input in inputs {
            if !seen.insert(input.previous_output) {
                return Err(TransactionError::DuplicatedInput);
            }
        }

        if detail.is_coinbase(data) {
            let len = inputs[0].script_sig.len();
            if !(2..=100).contains(&len) {
                return Err(TransactionError::BadCoinBaseSigScriptSize(len));
            }
        } else {
            for input in inputs {
                if input.previous_output.is_null() {
                    return Err(TransactionError::NullPreviousOutput);
                }
            }
        }

        Ok(())
    }
}

fn varint_len(n: u64) -> u64 {
    match n {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Estimates the non-witness serialized size of one transaction from its
/// arena view: 4 (version) + varint + inputs + varint + outputs + 4 (lock
/// time), with no witness marker/stack bytes included.
fn non_witness_size(
    detail: &TransactionDetail,
    inputs: &[crate::transactions::Input],
    outputs: &[crate::transactions::Output],
) -> u64 {
    let mut size = 4u64 + varint_len(inputs.len() as u64) + varint_len(outputs.len() as u64) + 4;
    for input in inputs {
        size += 36 + varint_len(input.script_sig.len() as u64) + input.script_sig.len() as u64 + 4;
    }
    for output in outputs {
        size += 8 + varint_len(output.script_pubkey.len() as u64) + output.script_pubkey.len() as u64;
    }
    let _ = detail;
    size
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::Hash;
    use crate::transactions::{Input, Output, TransactionBuilder, Witness};

    fn params() -> ConsensusParams {
        ConsensusParams::mainnet()
    }

    fn build(tx: TransactionBuilder) -> (TransactionData, TransactionDetail) {
        let mut builder = TransactionData::builder();
        builder.push(tx);
        let data = builder.build();
        let detail = data.details()[0];
        (data, detail)
    }

    #[test]
    fn duplicate_previous_output_is_rejected() {
        let dup = OutPoint { txid: Hash::from_bytes([1; 32]), index: 0 };
        let tx = TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![
                Input { previous_output: dup, script_sig: vec![], sequence: 0xffffffff },
                Input { previous_output: dup, script_sig: vec![], sequence: 0xffffffff },
            ],
            outputs: vec![Output { value: 1, script_pubkey: vec![] }],
            witnesses: vec![Witness::default(), Witness::default()],
        };
        let (data, detail) = build(tx);
        let p = params();
        assert_eq!(
            TransactionValidator::new(&p).validate(&data, &detail),
            Err(TransactionError::DuplicatedInput)
        );
    }

    #[test]
    fn negative_output_value_is_rejected() {
        let tx = TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input {
                previous_output: OutPoint { txid: Hash::from_bytes([2; 32]), index: 0 },
                script_sig: vec![],
                sequence: 0xffffffff,
            }],
            outputs: vec![Output { value: (-1i64) as u64, script_pubkey: vec![] }],
            witnesses: vec![Witness::default()],
        };
        let (data, detail) = build(tx);
        let p = params();
        assert!(matches!(
            TransactionValidator::new(&p).validate(&data, &detail),
            Err(TransactionError::NegativeOutputValue(_))
        ));
    }

    #[test]
    fn coinbase_sig_script_size_bounds_are_enforced() {
        let tx = TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![Input {
                previous_output: OutPoint::NULL,
                script_sig: vec![0x01],
                sequence: 0xffffffff,
            }],
            outputs: vec![Output { value: 0, script_pubkey: vec![] }],
            witnesses: vec![Witness::default()],
        };
        let (data, detail) = build(tx);
        let p = params();
        assert!(matches!(
            TransactionValidator::new(&p).validate(&data, &detail),
            Err(TransactionError::BadCoinBaseSigScriptSize(1))
        ));
    }

    #[test]
    fn non_coinbase_null_previous_output_is_rejected() {
        // Two inputs disqualifies this from being a coinbase (which requires
        // exactly one), so a null previous_output among them must be caught
        // by the NullPreviousOutput rule rather than treated as a coinbase.
        let tx = TransactionBuilder {
            version: 1,
            lock_time: 0,
            inputs: vec![
                Input { previous_output: OutPoint::NULL, script_sig: vec![], sequence: 0xffffffff },
                Input {
                    previous_output: OutPoint { txid: Hash::from_bytes([3; 32]), index: 0 },
                    script_sig: vec![],
                    sequence: 0xffffffff,
                },
            ],
            outputs: vec![Output { value: 0, script_pubkey: vec![] }],
            witnesses: vec![Witness::default(), Witness::default()],
        };
        let (data, detail) = build(tx);
        assert!(!detail.is_coinbase(&data));
        let p = params();
        assert_eq!(
            TransactionValidator::new(&p).validate(&data, &detail),
            Err(TransactionError::NullPreviousOutput)
        );
    }
}
