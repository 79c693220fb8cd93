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
#![warn(missing_docs)]

//! PeerLinks - end-to-end encrypted append-only channels over gossiping peers.
//!
//! This crate provides:
//! - A causally-ordered DAG of signed, encrypted channel messages with a
//!   deterministic CRDT linearization
//! - Invitation-issued signing chains rooted at a channel key
//! - Symmetric channel encryption and sealed-box invite transport
//! - Query/Bulk synchronization between peers with ban-on-violation
//! - A length-prefixed protobuf wire protocol
//! - Pluggable storage (in-memory reference + sled adapter)
//! - Monitoring via Prometheus metrics and structured logging

/// Protocol core (types, crypto, chains, messages, channels).
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// Peer sessions, sync agents, socket framing.
pub mod networking;
/// Top-level protocol container binding identities, channels and peers.
pub mod protocol;
/// Message and entity storage (trait, in-memory reference, sled adapter).
pub mod storage;
