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

//! Protocol-wide limits. Changing any of these breaks interoperability
//! with existing deployments.

use std::time::Duration;

/// Wire protocol version carried in `Hello`.
pub const VERSION: u32 = 1;

/// Length of peer and channel identifiers in bytes.
pub const ID_LENGTH: usize = 32;

/// Length of message hashes in bytes.
pub const HASH_SIZE: usize = 32;

/// Length of Ed25519 signatures in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Length of secretbox nonces in bytes.
pub const NONCE_SIZE: usize = 24;

/// Maximum number of links in a chain.
pub const MAX_CHAIN_LENGTH: usize = 3;

/// Maximum byte length of a trustee display name or channel name.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 128;

/// Default link validity window: 99 days, in seconds.
pub const EXPIRATION_DELTA: f64 = 99.0 * 24.0 * 3600.0;

/// Maximum timestamp spread among a message's parents: 30 days, in seconds.
pub const MAX_PARENT_DELTA: f64 = 30.0 * 24.0 * 3600.0;

/// Tolerated clock skew into the future, in seconds.
pub const FUTURE: f64 = 120.0;

/// Maximum number of abbreviated messages per query response.
pub const MAX_QUERY_LIMIT: usize = 1024;

/// Unresolved-parent bound before a sync falls back to full linear replay.
pub const MAX_UNRESOLVED_COUNT: usize = 262_144;

/// Maximum number of hashes processed per bulk request.
pub const MAX_BULK_COUNT: usize = 128;

/// Maximum number of leaves (and thus parents) per message.
pub const MAX_LEAVES_COUNT: usize = 128;

/// Time a sync request waits for its response before resolving empty.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum byte length of an error reason sent to a peer.
pub const MAX_ERROR_REASON_LEN: usize = 1024;

/// Maximum length-prefixed frame accepted from a socket.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Soft cap on the total encrypted payload bytes in one bulk response.
pub const MAX_BULK_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Maximum JSON body size keyed by chain length. Chain length 0 is the
/// channel root key itself and is unbounded.
pub fn max_json_size_for_chain(chain_length: usize) -> Option<usize> {
    match chain_length {
        0 => Some(usize::MAX),
        1 => Some(2_097_152),
        2 => Some(524_288),
        3 => Some(8_192),
        _ => None,
    }
}
