// Copyright (c) 2026 PeerLinks
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Shared ban-worthy violation type.
//!
//! Every wire-level protocol violation or cryptographic failure that is
//! attributable to a remote peer is a [`BanError`]. Handling one anywhere in
//! packet processing terminates the peer session with an `Error` packet.
//! Local errors (API misuse, missing chains, empty leaf sets) are carried in
//! per-module error enums and never kill a session.

use crate::core::constants::MAX_ERROR_REASON_LEN;
use thiserror::Error;

/// Protocol violation attributable to the remote peer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct BanError {
    /// Diagnostic reason; semantics live in the kind, not the string.
    pub reason: String,
}

impl BanError {
    /// Create a ban with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Reason truncated to the wire limit for the outgoing `Error` packet.
    pub fn wire_reason(&self) -> String {
        let mut r = self.reason.clone();
        if r.len() > MAX_ERROR_REASON_LEN {
            // Truncate on a char boundary.
            let mut end = MAX_ERROR_REASON_LEN;
            while !r.is_char_boundary(end) {
                end -= 1;
            }
            r.truncate(end);
        }
        r
    }
}
