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

//! A deadline that the single-in-flight-request trackers in `sync` use to
//! decide when a peer has gone quiet.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub enum Timeout {
    /// Already expired; the next check always reports expired.
    Immediate,
    /// Never expires.
    Infinite,
    /// Expires `Duration` after the moment this value was constructed.
    At { deadline: Instant },
}

impl Timeout {
    pub fn immediate() -> Self {
        Timeout::Immediate
    }

    pub fn infinite() -> Self {
        Timeout::Infinite
    }

    pub fn from_millis(millis: u64) -> Self {
        Timeout::At {
            deadline: Instant::now() + Duration::from_millis(millis),
        }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Timeout::At {
            deadline: Instant::now() + duration,
        }
    }

    /// The time remaining, or `None` if infinite. Returns `Duration::ZERO`
    /// rather than underflowing once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Timeout::Immediate => Some(Duration::ZERO),
            Timeout::Infinite => None,
            Timeout::At { deadline } => Some(deadline.saturating_duration_since(Instant::now())),
        }
    }

    pub fn is_expired(&self) -> bool {
        match self {
            Timeout::Immediate => true,
            Timeout::Infinite => false,
            Timeout::At { deadline } => Instant::now() >= *deadline,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn immediate_is_always_expired() {
        assert!(Timeout::immediate().is_expired());
        assert_eq!(Timeout::immediate().remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn infinite_never_expires_and_has_no_remaining() {
        assert!(!Timeout::infinite().is_expired());
        assert_eq!(Timeout::infinite().remaining(), None);
    }

    #[test]
    fn from_millis_is_not_expired_immediately() {
        let timeout = Timeout::from_millis(10_000);
        assert!(!timeout.is_expired());
        assert!(timeout.remaining().unwrap() <= Duration::from_millis(10_000));
    }
}
