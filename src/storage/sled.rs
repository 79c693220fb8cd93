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

//! Persistent storage on sled.
//!
//! Message keys are `channel_id || height_be || hash`, so a prefix scan of a
//! channel walks the CRDT linearization directly. A hash index locates
//! messages without knowing their height; leaf and referenced-hash sets are
//! kept as key-only trees.

use async_trait::async_trait;
use prost::Message as ProstMessage;
use std::sync::Mutex;

use crate::core::constants::MAX_LEAVES_COUNT;
use crate::core::message::Message;
use crate::core::types::{ChannelId, Hash32};
use crate::core::wire;

use super::{Cursor, QuerySlice, Storage, StorageError};

/// Separator between entity prefix and id.
const ENTITY_SEP: u8 = 0;

/// Sled-backed storage adapter.
pub struct SledStorage {
    db: sled::Db,
    messages: sled::Tree,
    index: sled::Tree,
    leaves: sled::Tree,
    refs: sled::Tree,
    meta: sled::Tree,
    entities: sled::Tree,
    /// Serializes multi-tree writes; channels already serialize per-channel.
    write_lock: Mutex<()>,
}

fn order_key(channel_id: &ChannelId, height: i64, hash: &Hash32) -> Vec<u8> {
    let mut key = Vec::with_capacity(32 + 8 + 32);
    key.extend_from_slice(channel_id.as_bytes());
    key.extend_from_slice(&(height as u64).to_be_bytes());
    key.extend_from_slice(hash.as_bytes());
    key
}

fn hash_key(channel_id: &ChannelId, hash: &Hash32) -> Vec<u8> {
    let mut key = Vec::with_capacity(64);
    key.extend_from_slice(channel_id.as_bytes());
    key.extend_from_slice(hash.as_bytes());
    key
}

fn entity_key(prefix: &str, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + id.len());
    key.extend_from_slice(prefix.as_bytes());
    key.push(ENTITY_SEP);
    key.extend_from_slice(id.as_bytes());
    key
}

fn decode_message(bytes: &[u8]) -> Result<Message, StorageError> {
    let wm = wire::ChannelMessage::decode(bytes).map_err(|_| StorageError::Codec)?;
    Message::from_wire(&wm).map_err(|_| StorageError::Codec)
}

fn parse_order_key(key: &[u8]) -> Option<(i64, Hash32)> {
    if key.len() != 32 + 8 + 32 {
        return None;
    }
    let height = u64::from_be_bytes(key[32..40].try_into().ok()?) as i64;
    let hash = Hash32::from_slice(&key[40..])?;
    Some((height, hash))
}

impl SledStorage {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|_| StorageError::Open)?;
        let messages = db.open_tree(b"messages").map_err(|_| StorageError::Open)?;
        let index = db.open_tree(b"index").map_err(|_| StorageError::Open)?;
        let leaves = db.open_tree(b"leaves").map_err(|_| StorageError::Open)?;
        let refs = db.open_tree(b"refs").map_err(|_| StorageError::Open)?;
        let meta = db.open_tree(b"meta").map_err(|_| StorageError::Open)?;
        let entities = db.open_tree(b"entities").map_err(|_| StorageError::Open)?;
        Ok(Self {
            db,
            messages,
            index,
            leaves,
            refs,
            meta,
            entities,
            write_lock: Mutex::new(()),
        })
    }

    /// Flush dirty buffers to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(|_| StorageError::Io)?;
        Ok(())
    }

    fn height_of(&self, channel_id: &ChannelId, hash: &Hash32) -> Result<Option<i64>, StorageError> {
        let Some(v) = self
            .index
            .get(hash_key(channel_id, hash))
            .map_err(|_| StorageError::Io)?
        else {
            return Ok(None);
        };
        let bytes: [u8; 8] = v.as_ref().try_into().map_err(|_| StorageError::Codec)?;
        Ok(Some(u64::from_be_bytes(bytes) as i64))
    }

    fn get_message_sync(
        &self,
        channel_id: &ChannelId,
        hash: &Hash32,
    ) -> Result<Option<Message>, StorageError> {
        let Some(height) = self.height_of(channel_id, hash)? else {
            return Ok(None);
        };
        let Some(bytes) = self
            .messages
            .get(order_key(channel_id, height, hash))
            .map_err(|_| StorageError::Io)?
        else {
            return Ok(None);
        };
        decode_message(&bytes).map(Some)
    }

    /// All order keys of a channel, sorted. Linear in channel size; queries
    /// and offsets operate on this snapshot.
    fn channel_keys(&self, channel_id: &ChannelId) -> Result<Vec<(i64, Hash32)>, StorageError> {
        let mut keys = Vec::new();
        for item in self.messages.scan_prefix(channel_id.as_bytes()) {
            let (key, _) = item.map_err(|_| StorageError::Io)?;
            if let Some(parsed) = parse_order_key(&key) {
                keys.push(parsed);
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl Storage for SledStorage {
    async fn add_message(&self, message: &Message) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().expect("sled write lock");
        let channel_id = message.channel_id();
        let hash = message.hash();
        let ikey = hash_key(channel_id, hash);
        if self.index.contains_key(&ikey).map_err(|_| StorageError::Io)? {
            return Ok(());
        }
        self.messages
            .insert(
                order_key(channel_id, message.height(), hash),
                wire::encode(&message.to_wire()),
            )
            .map_err(|_| StorageError::Io)?;
        let height_be = (message.height() as u64).to_be_bytes();
        self.index
            .insert(&ikey, &height_be[..])
            .map_err(|_| StorageError::Io)?;
        const EMPTY: &[u8] = &[];
        for parent in message.parents() {
            let pkey = hash_key(channel_id, parent);
            self.refs.insert(&pkey, EMPTY).map_err(|_| StorageError::Io)?;
            self.leaves.remove(&pkey).map_err(|_| StorageError::Io)?;
        }
        if !self.refs.contains_key(&ikey).map_err(|_| StorageError::Io)? {
            self.leaves
                .insert(&ikey, EMPTY)
                .map_err(|_| StorageError::Io)?;
        }
        let count = match self
            .meta
            .get(channel_id.as_bytes())
            .map_err(|_| StorageError::Io)?
        {
            Some(v) => {
                let bytes: [u8; 8] = v.as_ref().try_into().map_err(|_| StorageError::Codec)?;
                u64::from_be_bytes(bytes)
            }
            None => 0,
        };
        let count_be = (count + 1).to_be_bytes();
        self.meta
            .insert(channel_id.as_bytes(), &count_be[..])
            .map_err(|_| StorageError::Io)?;
        Ok(())
    }

    async fn get_message_count(&self, channel_id: &ChannelId) -> Result<usize, StorageError> {
        match self
            .meta
            .get(channel_id.as_bytes())
            .map_err(|_| StorageError::Io)?
        {
            Some(v) => {
                let bytes: [u8; 8] = v.as_ref().try_into().map_err(|_| StorageError::Codec)?;
                Ok(u64::from_be_bytes(bytes) as usize)
            }
            None => Ok(0),
        }
    }

    async fn has_message(
        &self,
        channel_id: &ChannelId,
        hash: &Hash32,
    ) -> Result<bool, StorageError> {
        self.index
            .contains_key(hash_key(channel_id, hash))
            .map_err(|_| StorageError::Io)
    }

    async fn get_message(
        &self,
        channel_id: &ChannelId,
        hash: &Hash32,
    ) -> Result<Option<Message>, StorageError> {
        self.get_message_sync(channel_id, hash)
    }

    async fn get_messages(
        &self,
        channel_id: &ChannelId,
        hashes: &[Hash32],
    ) -> Result<Vec<Option<Message>>, StorageError> {
        let mut out = Vec::with_capacity(hashes.len());
        for hash in hashes {
            out.push(self.get_message_sync(channel_id, hash)?);
        }
        Ok(out)
    }

    async fn get_message_at_offset(
        &self,
        channel_id: &ChannelId,
        offset: usize,
    ) -> Result<Option<Message>, StorageError> {
        match self
            .messages
            .scan_prefix(channel_id.as_bytes())
            .nth(offset)
        {
            Some(item) => {
                let (_, value) = item.map_err(|_| StorageError::Io)?;
                decode_message(&value).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn get_leaves(&self, channel_id: &ChannelId) -> Result<Vec<Message>, StorageError> {
        let mut leaves = Vec::new();
        for item in self.leaves.scan_prefix(channel_id.as_bytes()) {
            let (key, _) = item.map_err(|_| StorageError::Io)?;
            let Some(hash) = Hash32::from_slice(&key[32..]) else {
                continue;
            };
            if let Some(m) = self.get_message_sync(channel_id, &hash)? {
                leaves.push(m);
            }
        }
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
        let keys = self.channel_keys(channel_id)?;
        let index = match cursor {
            Cursor::Height(h) => keys.partition_point(|(height, _)| height < h),
            Cursor::Hash(hash) => {
                let Some(height) = self.height_of(channel_id, hash)? else {
                    return Ok(QuerySlice::default());
                };
                match keys.binary_search(&(height, *hash)) {
                    Ok(i) => i,
                    Err(_) => return Ok(QuerySlice::default()),
                }
            }
        };
        let (start, end) = if is_backward {
            (index.saturating_sub(limit), index)
        } else {
            (index, (index + limit).min(keys.len()))
        };
        let mut messages = Vec::with_capacity(end - start);
        for (height, hash) in &keys[start..end] {
            let Some(bytes) = self
                .messages
                .get(order_key(channel_id, *height, hash))
                .map_err(|_| StorageError::Io)?
            else {
                return Err(StorageError::Io);
            };
            messages.push(decode_message(&bytes)?);
        }
        Ok(QuerySlice {
            forward_hash: keys.get(end).map(|(_, h)| *h),
            backward_hash: if start > 0 {
                messages.first().map(|m| *m.hash())
            } else {
                None
            },
            messages,
        })
    }

    async fn store_entity(&self, prefix: &str, id: &str, blob: &[u8]) -> Result<(), StorageError> {
        self.entities
            .insert(entity_key(prefix, id), blob)
            .map_err(|_| StorageError::Io)?;
        Ok(())
    }

    async fn retrieve_entity(
        &self,
        prefix: &str,
        id: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .entities
            .get(entity_key(prefix, id))
            .map_err(|_| StorageError::Io)?
            .map(|v| v.to_vec()))
    }

    async fn remove_entity(&self, prefix: &str, id: &str) -> Result<(), StorageError> {
        self.entities
            .remove(entity_key(prefix, id))
            .map_err(|_| StorageError::Io)?;
        Ok(())
    }

    async fn get_entity_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut scan_prefix = prefix.as_bytes().to_vec();
        scan_prefix.push(ENTITY_SEP);
        let mut out = Vec::new();
        for item in self.entities.scan_prefix(&scan_prefix) {
            let (key, _) = item.map_err(|_| StorageError::Io)?;
            if let Ok(id) = std::str::from_utf8(&key[scan_prefix.len()..]) {
                out.push(id.to_string());
            }
        }
        Ok(out)
    }
}
