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

//! The validation-status sidecar (`spec.md` §5 "Sidecar"): a mapping from
//! chain height to whether a block's body has been validated yet. Heights
//! with no entry are implicitly `Unvalidated` - `BlockSync` only ever calls
//! `set` for heights it has actually processed.

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Whether a block's body has cleared `BlockSync`'s worker.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValidationStatus {
    Unvalidated,
    StructureValid,
}

#[derive(Default)]
pub struct ValidationStatusSidecar {
    statuses: Mutex<BTreeMap<u64, ValidationStatus>>,
}

impl ValidationStatusSidecar {
    pub fn new() -> Self {
        ValidationStatusSidecar::default()
    }

    pub fn set(&self, height: u64, status: ValidationStatus) {
        self.statuses.lock().insert(height, status);
    }

    /// The recorded status at `height`, or `Unvalidated` if nothing has been
    /// recorded there yet.
    pub fn get(&self, height: u64) -> ValidationStatus {
        self.statuses.lock().get(&height).copied().unwrap_or(ValidationStatus::Unvalidated)
    }

    /// The first height in `from_height..=to_height` whose status satisfies
    /// `predicate`, or `None` if every height in range fails it. `to_height`
    /// bounds the scan to the caller's known chain tip, since the sidecar
    /// itself has no notion of chain length.
    pub fn find_in_chain_if(
        &self,
        from_height: u64,
        to_height: u64,
        predicate: impl Fn(ValidationStatus) -> bool,
    ) -> Option<u64> {
        let statuses = self.statuses.lock();
        (from_height..=to_height).find(|height| {
            let status = statuses.get(height).copied().unwrap_or(ValidationStatus::Unvalidated);
            predicate(status)
        })
    }
}
