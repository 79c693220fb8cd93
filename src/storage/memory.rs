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

//! In-memory reference storage. The default for tests and embedding.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::core::constants::MAX_LEAVES_COUNT;
use crate::core::message::Message;
use crate::core::types::{ChannelId, Hash32};

use super::{Cursor, QuerySlice, Storage, StorageError};

/// Sort key of the CRDT linearization.
type OrderKey = (i64, Hash32);

#[derive(Default)]
struct ChannelData {
    /// Hashes sorted by `(height, hash)`.
    order: Vec<Hash32>,
    by_hash: BTreeMap<Hash32, Message>,
    leaves: BTreeSet<Hash32>,
    /// Every hash any stored message has listed as a parent.
    referenced: BTreeSet<Hash32>,
}

impl ChannelData {
    fn key_of(&self, hash: &Hash32) -> Option<OrderKey> {
        self.by_hash.get(hash).map(|m| (m.height(), *m.hash()))
    }

    fn index_of_key(&self, key: &OrderKey) -> Result<usize, usize> {
        self.order.binary_search_by(|h| {
            let k = self
                .by_hash
                .get(h)
                .map(|m| (m.height(), *m.hash()))
                .expect("order entry has message");
            k.cmp(key)
        })
    }

    fn insert(&mut self, message: Message) {
        let hash = *message.hash();
        if self.by_hash.contains_key(&hash) {
            return;
        }
        let key = (message.height(), hash);
        for parent in message.parents() {
            self.referenced.insert(*parent);
            self.leaves.remove(parent);
        }
        if !self.referenced.contains(&hash) {
            self.leaves.insert(hash);
        }
        self.by_hash.insert(hash, message);
        let at = match self.index_of_key(&key) {
            Ok(i) | Err(i) => i,
        };
        self.order.insert(at, hash);
    }

    fn slice(&self, cursor: &Cursor, is_backward: bool, limit: usize) -> QuerySlice {
        let index = match cursor {
            Cursor::Height(h) => self.order.partition_point(|hash| {
                self.by_hash
                    .get(hash)
                    .map(|m| m.height() < *h)
                    .unwrap_or(false)
            }),
            Cursor::Hash(hash) => match self.key_of(hash).map(|k| self.index_of_key(&k)) {
                Some(Ok(i)) => i,
                // Lenient: unknown hash yields an empty slice.
                _ => return QuerySlice::default(),
            },
        };
        let (start, end) = if is_backward {
            (index.saturating_sub(limit), index)
        } else {
            (index, (index + limit).min(self.order.len()))
        };
        let messages: Vec<Message> = self.order[start..end]
            .iter()
            .map(|h| self.by_hash[h].clone())
            .collect();
        QuerySlice {
            forward_hash: self.order.get(end).copied(),
            backward_hash: if start > 0 {
                messages.first().map(|m| *m.hash())
            } else {
                None
            },
            messages,
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    channels: BTreeMap<ChannelId, ChannelData>,
    entities: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

/// In-memory storage behind a mutex.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn add_message(&self, message: &Message) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("storage lock");
        inner
            .channels
            .entry(*message.channel_id())
            .or_default()
            .insert(message.clone());
        Ok(())
    }

    async fn get_message_count(&self, channel_id: &ChannelId) -> Result<usize, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        Ok(inner
            .channels
            .get(channel_id)
            .map(|c| c.order.len())
            .unwrap_or(0))
    }

    async fn has_message(
        &self,
        channel_id: &ChannelId,
        hash: &Hash32,
    ) -> Result<bool, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        Ok(inner
            .channels
            .get(channel_id)
            .map(|c| c.by_hash.contains_key(hash))
            .unwrap_or(false))
    }

    async fn get_message(
        &self,
        channel_id: &ChannelId,
        hash: &Hash32,
    ) -> Result<Option<Message>, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        Ok(inner
            .channels
            .get(channel_id)
            .and_then(|c| c.by_hash.get(hash).cloned()))
    }

    async fn get_messages(
        &self,
        channel_id: &ChannelId,
        hashes: &[Hash32],
    ) -> Result<Vec<Option<Message>>, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        let data = inner.channels.get(channel_id);
        Ok(hashes
            .iter()
            .map(|h| data.and_then(|c| c.by_hash.get(h).cloned()))
            .collect())
    }

    async fn get_message_at_offset(
        &self,
        channel_id: &ChannelId,
        offset: usize,
    ) -> Result<Option<Message>, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        Ok(inner.channels.get(channel_id).and_then(|c| {
            c.order
                .get(offset)
                .map(|h| c.by_hash[h].clone())
        }))
    }

    async fn get_leaves(&self, channel_id: &ChannelId) -> Result<Vec<Message>, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        let Some(data) = inner.channels.get(channel_id) else {
            return Ok(Vec::new());
        };
        let mut leaves: Vec<Message> = data
            .leaves
            .iter()
            .filter_map(|h| data.by_hash.get(h).cloned())
            .collect();
        leaves.sort_by(|a, b| (a.height(), a.hash()).cmp(&(b.height(), b.hash())));
        leaves.truncate(MAX_LEAVES_COUNT);
        Ok(leaves)
    }

    async fn query(
        &self,
        channel_id: &ChannelId,
        cursor: &Cursor,
        is_backward: bool,
        limit: usize,
    ) -> Result<QuerySlice, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        Ok(inner
            .channels
            .get(channel_id)
            .map(|c| c.slice(cursor, is_backward, limit))
            .unwrap_or_default())
    }

    async fn store_entity(&self, prefix: &str, id: &str, blob: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("storage lock");
        inner
            .entities
            .entry(prefix.to_string())
            .or_default()
            .insert(id.to_string(), blob.to_vec());
        Ok(())
    }

    async fn retrieve_entity(
        &self,
        prefix: &str,
        id: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        Ok(inner
            .entities
            .get(prefix)
            .and_then(|m| m.get(id).cloned()))
    }

    async fn remove_entity(&self, prefix: &str, id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("storage lock");
        if let Some(m) = inner.entities.get_mut(prefix) {
            m.remove(id);
        }
        Ok(())
    }

    async fn get_entity_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.lock().expect("storage lock");
        Ok(inner
            .entities
            .get(prefix)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }
}
