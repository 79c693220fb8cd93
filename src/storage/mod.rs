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

//! Message and entity storage.
//!
//! A store keeps, per channel: every known message indexed by hash and
//! ordered by `(height ASC, hash ASC)` (the CRDT linearization), plus the
//! leaf set (hashes no stored message lists as a parent). It also provides
//! a small blob store for persisted entities ("channel", "identity").
//! Channels are the only writers; cross-channel transactions are not needed.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::message::Message;
use crate::core::types::{ChannelId, Hash32};

/// In-memory reference implementation.
pub mod memory;
/// Persistent sled-backed adapter.
pub mod sled;

pub use self::memory::MemoryStorage;
pub use self::sled::SledStorage;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("db open")]
    Open,
    #[error("db io")]
    Io,
    #[error("codec")]
    Codec,
}

/// Position in a channel's CRDT linearization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cursor {
    /// First message at or above this height.
    Height(i64),
    /// The message with this hash. Unknown hashes yield an empty slice.
    Hash(Hash32),
}

/// One slice of the linearized order.
#[derive(Clone, Debug, Default)]
pub struct QuerySlice {
    /// Messages in CRDT order.
    pub messages: Vec<Message>,
    /// Hash just past the slice, when more messages follow.
    pub forward_hash: Option<Hash32>,
    /// First hash of the slice, when the slice does not start at offset 0.
    pub backward_hash: Option<Hash32>,
}

/// Channel-scoped message store plus entity blobs.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a message; idempotent on hash. Maintains order and leaves.
    async fn add_message(&self, message: &Message) -> Result<(), StorageError>;

    /// Number of stored messages for the channel.
    async fn get_message_count(&self, channel_id: &ChannelId) -> Result<usize, StorageError>;

    /// Whether a message with `hash` is stored.
    async fn has_message(&self, channel_id: &ChannelId, hash: &Hash32)
        -> Result<bool, StorageError>;

    /// Fetch one message by hash.
    async fn get_message(
        &self,
        channel_id: &ChannelId,
        hash: &Hash32,
    ) -> Result<Option<Message>, StorageError>;

    /// Fetch several messages by hash, order preserved.
    async fn get_messages(
        &self,
        channel_id: &ChannelId,
        hashes: &[Hash32],
    ) -> Result<Vec<Option<Message>>, StorageError>;

    /// Message at `offset` in CRDT order.
    async fn get_message_at_offset(
        &self,
        channel_id: &ChannelId,
        offset: usize,
    ) -> Result<Option<Message>, StorageError>;

    /// Current leaves in CRDT order, capped at
    /// [`crate::core::constants::MAX_LEAVES_COUNT`].
    async fn get_leaves(&self, channel_id: &ChannelId) -> Result<Vec<Message>, StorageError>;

    /// Slice the linearized order around `cursor`.
    async fn query(
        &self,
        channel_id: &ChannelId,
        cursor: &Cursor,
        is_backward: bool,
        limit: usize,
    ) -> Result<QuerySlice, StorageError>;

    /// Store an entity blob under `(prefix, id)`.
    async fn store_entity(&self, prefix: &str, id: &str, blob: &[u8]) -> Result<(), StorageError>;

    /// Fetch an entity blob.
    async fn retrieve_entity(
        &self,
        prefix: &str,
        id: &str,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove an entity blob.
    async fn remove_entity(&self, prefix: &str, id: &str) -> Result<(), StorageError>;

    /// All entity ids under `prefix`.
    async fn get_entity_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
