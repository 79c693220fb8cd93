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

//! Protocol core: channels, messages, trust chains and their encodings.

/// Channel DAG acceptance, posting, query/bulk services and sync driver.
pub mod channel;
/// Signed delegation links and verification chains.
pub mod chain;
/// Node configuration (TOML).
pub mod config;
/// Protocol-wide limits and tuning constants.
pub mod constants;
/// Ban-worthy violation type shared across modules.
pub mod error;
/// Long-lived signing identity with per-channel chains.
pub mod identity;
/// Encrypted channel messages.
pub mod message;
/// Cryptographic primitives (Ed25519, sealed box, secretbox, BLAKE2b).
pub mod security;
/// Core id/hash types and canonical at-rest encoding.
pub mod types;
/// One-shot notification lists keyed by string ids.
pub mod wait_list;
/// Wire schema (protobuf) and packet codec.
pub mod wire;
