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

//! Legacy signature-operation counting: `CheckSig`/`CheckSigVerify` count as
//! 1, `CheckMultiSig`/`CheckMultiSigVerify` count as 20, scanning raw script
//! bytes while skipping over push-data payloads so pushed bytes that happen
//! to match an opcode value are not double-counted (`spec.md` §4.6(f)).

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKSIGVERIFY: u8 = 0xad;
const OP_CHECKMULTISIG: u8 = 0xae;
const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

pub fn count_sigops(script: &[u8]) -> u64 {
    let mut count = 0u64;
    let mut i = 0usize;
    while i < script.len() {
        let opcode = script[i];
        i += 1;
        match opcode {
            0x01..=0x4b => {
                i += opcode as usize;
            }
            OP_PUSHDATA1 => {
                if let Some(&len) = script.get(i) {
                    i += 1 + len as usize;
                } else {
                    break;
                }
            }
            OP_PUSHDATA2 => {
                if let Some(bytes) = script.get(i..i + 2) {
                    let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
                    i += 2 + len;
                } else {
                    break;
                }
            }
            OP_PUSHDATA4 => {
                if let Some(bytes) = script.get(i..i + 4) {
                    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
                    i += 4 + len;
                } else {
                    break;
                }
            }
            OP_CHECKSIG | OP_CHECKSIGVERIFY => count += 1,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => count += 20,
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_checksig_and_checkmultisig() {
        let script = vec![OP_CHECKSIG, OP_CHECKMULTISIG, OP_CHECKSIGVERIFY];
        assert_eq!(count_sigops(&script), 1 + 20 + 1);
    }

    #[test]
    fn push_data_payload_is_skipped_not_scanned() {
        // A 1-byte push whose payload equals OP_CHECKMULTISIG's opcode value
        // must not be counted as a sigop.
        let script = vec![0x01, OP_CHECKMULTISIG, OP_CHECKSIG];
        assert_eq!(count_sigops(&script), 1);
    }

    #[test]
    fn pushdata1_skips_declared_length() {
        let script = vec![OP_PUSHDATA1, 2, 0xAA, 0xBB, OP_CHECKMULTISIG, OP_CHECKSIG];
        assert_eq!(count_sigops(&script), 21);
    }
}
