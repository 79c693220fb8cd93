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

//! A channel: an append-only DAG of encrypted messages with strict
//! acceptance rules, query/bulk services for remote peers, and the
//! discovery-and-fetch sync driver.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::debug;
use zeroize::Zeroize;

use crate::core::chain::Chain;
use crate::core::constants::{
    max_json_size_for_chain, FUTURE, MAX_BULK_COUNT, MAX_BULK_RESPONSE_BYTES,
    MAX_DISPLAY_NAME_LENGTH, MAX_LEAVES_COUNT, MAX_PARENT_DELTA, MAX_QUERY_LIMIT, NONCE_SIZE,
};
use crate::core::error::BanError;
use crate::core::identity::{Identity, IdentityError};
use crate::core::message::{Message, MessageBody, MessageError};
use crate::core::security::crypto::{self, CryptoError, SymmetricKey};
use crate::core::types::{
    decode_canonical_limited, encode_canonical, now_seconds, ChannelId, CodecError, Hash32,
};
use crate::core::wait_list::{WaitList, Waiter};
use crate::core::wire;
use crate::monitoring::metrics::Metrics;
use crate::storage::{Cursor, Storage, StorageError};

/// Domain-separation key for channel ids.
const CHANNEL_ID_KEY: &[u8] = b"peerlinks-channel-id";
/// Domain-separation key for channel symmetric keys.
const SYMMETRIC_KEY: &[u8] = b"peerlinks-symmetric";
/// Size cap for persisted channel blobs.
const MAX_ENTITY_SIZE: usize = 64 * 1024;

/// Channel errors. `Ban` variants terminate the offending peer session;
/// everything else is surfaced to the local caller.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Ban(#[from] BanError),
    #[error("no fresh leaves")]
    NoLeaves,
    #[error("channel not synchronized")]
    NotSynchronized,
    #[error("posting a root is forbidden")]
    RootForbidden,
    #[error("feed is read-only")]
    FeedReadOnly,
    #[error("channel name too long")]
    NameTooLong,
    #[error("invalid invite")]
    InvalidInvite,
    #[error("invite issued to a different identity")]
    InviteMismatch,
    #[error("sync session closed")]
    SyncClosed,
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("crypto")]
    Crypto(#[from] CryptoError),
    #[error("codec")]
    Codec,
}

impl ChannelError {
    /// Ban reason, if this error should terminate the peer session.
    pub fn ban_reason(&self) -> Option<&str> {
        match self {
            ChannelError::Ban(b) => Some(&b.reason),
            _ => None,
        }
    }
}

impl From<MessageError> for ChannelError {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::Ban(b) => ChannelError::Ban(b),
            MessageError::Codec => ChannelError::Codec,
            MessageError::Crypto(c) => ChannelError::Crypto(c),
        }
    }
}

/// Sync transport errors, produced by a [`RemoteChannel`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote violated the protocol.
    #[error(transparent)]
    Ban(#[from] BanError),
    /// The session or agent is gone; retry on the next synchronize trigger.
    #[error("sync closed")]
    Closed,
}

/// Client view of a remote channel during sync. Implemented by the
/// per-(peer, channel) sync agent.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Issue a query for abbreviated messages around `cursor`.
    async fn query(
        &self,
        cursor: Cursor,
        is_backward: bool,
        limit: u32,
    ) -> Result<wire::QueryResponse, SyncError>;

    /// Fetch full messages by hash.
    async fn bulk(&self, hashes: &[Hash32]) -> Result<wire::BulkResponse, SyncError>;
}

/// Persisted channel record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Channel root public key.
    pub public_key: [u8; 32],
    /// Channel name.
    pub name: String,
    /// Whether the channel is a read-only feed.
    pub is_feed: bool,
    /// Hex public key of the owning identity, when known.
    pub owner_pub_hex: Option<String>,
}

/// An end-to-end encrypted append-only channel.
pub struct Channel {
    public_key: [u8; 32],
    name: String,
    is_feed: bool,
    channel_id: ChannelId,
    encryption_key: SymmetricKey,
    storage: Arc<dyn Storage>,
    metrics: Arc<Metrics>,
    updates: broadcast::Sender<ChannelId>,
    /// Serializes acceptance; one `receive` at a time per channel.
    accept_lock: AsyncMutex<()>,
    message_waiters: WaitList<Message>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("channel_id", &self.channel_id)
            .field("is_feed", &self.is_feed)
            .finish()
    }
}

impl Channel {
    /// Construct a channel from its root public key. Derives the channel id
    /// and symmetric key; does not touch storage.
    pub fn new(
        public_key: [u8; 32],
        name: &str,
        is_feed: bool,
        storage: Arc<dyn Storage>,
        metrics: Arc<Metrics>,
        updates: broadcast::Sender<ChannelId>,
    ) -> Result<Self, ChannelError> {
        if name.len() > MAX_DISPLAY_NAME_LENGTH {
            return Err(ChannelError::NameTooLong);
        }
        let channel_id = Hash32::from_bytes(crypto::keyed_hash32(CHANNEL_ID_KEY, &public_key)?);
        let encryption_key =
            SymmetricKey::from_bytes(crypto::keyed_hash32(SYMMETRIC_KEY, &public_key)?);
        Ok(Self {
            public_key,
            name: name.to_string(),
            is_feed,
            channel_id,
            encryption_key,
            storage,
            metrics,
            updates,
            accept_lock: AsyncMutex::new(()),
            message_waiters: WaitList::new(),
        })
    }

    /// Create a brand-new channel rooted at `identity`, posting the root.
    pub async fn create(
        identity: &Identity,
        name: &str,
        storage: Arc<dyn Storage>,
        metrics: Arc<Metrics>,
        updates: broadcast::Sender<ChannelId>,
    ) -> Result<Self, ChannelError> {
        let channel = Channel::new(
            *identity.public_key(),
            name,
            false,
            storage,
            metrics,
            updates,
        )?;
        identity.add_chain(channel.id(), Chain::empty());
        let content =
            identity.sign_content(channel.id(), &[], 0, now_seconds(), &MessageBody::Root)?;
        let root = Message::seal(channel.key(), channel.id(), Vec::new(), 0, &content, None)?;
        channel.receive(root).await?;
        Ok(channel)
    }

    /// Join a channel from a received invite. The invite chain must end at
    /// `identity`'s public key.
    pub fn from_invite(
        invite: &wire::Invite,
        identity: &Identity,
        storage: Arc<dyn Storage>,
        metrics: Arc<Metrics>,
        updates: broadcast::Sender<ChannelId>,
    ) -> Result<Self, ChannelError> {
        let public_key: [u8; 32] = invite
            .channel_pub_key
            .as_slice()
            .try_into()
            .map_err(|_| ChannelError::InvalidInvite)?;
        let chain =
            Chain::from_wire(&invite.chain).map_err(|_| ChannelError::InvalidInvite)?;
        let channel = Channel::new(
            public_key,
            &invite.channel_name,
            false,
            storage,
            metrics,
            updates,
        )?;
        let leaf = chain
            .verify(&public_key, channel.id(), now_seconds())
            .map_err(|_| ChannelError::InvalidInvite)?;
        if &leaf != identity.public_key() {
            return Err(ChannelError::InviteMismatch);
        }
        identity.add_chain(channel.id(), chain);
        Ok(channel)
    }

    /// Channel id.
    pub fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Root public key.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this channel is a read-only feed.
    pub fn is_feed(&self) -> bool {
        self.is_feed
    }

    pub(crate) fn key(&self) -> &SymmetricKey {
        &self.encryption_key
    }

    /// Wipe the symmetric key. The channel is unusable afterwards.
    pub fn clear(&mut self) {
        self.encryption_key.zeroize();
    }

    /// Encrypt opaque data under the channel key with a fresh nonce.
    pub fn encrypt(&self, data: &[u8]) -> Result<([u8; NONCE_SIZE], Vec<u8>), ChannelError> {
        let nonce = crypto::random_bytes();
        let sealed = crypto::secretbox_seal(&self.encryption_key, &nonce, data)?;
        Ok((nonce, sealed))
    }

    /// Decrypt data sealed with [`Channel::encrypt`]. MAC failure is
    /// attributable to the sender.
    pub fn decrypt(&self, sealed: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>, ChannelError> {
        crypto::secretbox_open(&self.encryption_key, nonce, sealed)
            .map_err(|_| BanError::new("decryption failed").into())
    }

    /// Park until the message with `hash` is accepted.
    pub fn wait_for_message(&self, hash: &Hash32) -> Waiter<Message> {
        self.message_waiters.wait_for(&hash.to_hex())
    }

    /// Resolve once the message with `hash` is stored, now or later.
    pub async fn await_message(&self, hash: &Hash32) -> Result<Message, ChannelError> {
        // Waiter first; acceptance resolves after storing, so one of the
        // two paths always observes the message.
        let waiter = self.wait_for_message(hash);
        if let Some(message) = self.storage.get_message(&self.channel_id, hash).await? {
            return Ok(message);
        }
        waiter.wait().await.map_err(|_| ChannelError::SyncClosed)
    }

    /// Number of stored messages.
    pub async fn message_count(&self) -> Result<usize, ChannelError> {
        Ok(self.storage.get_message_count(&self.channel_id).await?)
    }

    /// Message at `offset` in CRDT order.
    pub async fn message_at_offset(&self, offset: usize) -> Result<Option<Message>, ChannelError> {
        Ok(self
            .storage
            .get_message_at_offset(&self.channel_id, offset)
            .await?)
    }

    /// Open a stored message's content.
    pub fn open(&self, message: &Message) -> Result<crate::core::message::MessageContent, ChannelError> {
        Ok(message.decrypt(&self.encryption_key)?)
    }

    /// Seal signed content into an encrypted message for this channel.
    pub fn seal(
        &self,
        parents: Vec<Hash32>,
        height: i64,
        content: &wire::Content,
    ) -> Result<Message, ChannelError> {
        Ok(Message::seal(
            &self.encryption_key,
            &self.channel_id,
            parents,
            height,
            content,
            None,
        )?)
    }

    /// Accept a message into the DAG. Returns `false` for duplicates. Every
    /// other rejection is ban-worthy for the peer that sent it.
    pub async fn receive(&self, message: Message) -> Result<bool, ChannelError> {
        let _guard = self.accept_lock.lock().await;
        self.receive_locked(message).await
    }

    async fn receive_locked(&self, message: Message) -> Result<bool, ChannelError> {
        if message.channel_id() != &self.channel_id {
            return Err(BanError::new("message for a different channel").into());
        }
        if self
            .storage
            .has_message(&self.channel_id, message.hash())
            .await?
        {
            return Ok(false);
        }

        let content = message.decrypt(&self.encryption_key)?;
        if !message.verify_content(&content, &self.public_key, &self.channel_id) {
            return Err(BanError::new("invalid signature or chain").into());
        }

        if message.parents().len() > MAX_LEAVES_COUNT {
            return Err(BanError::new("too many parents").into());
        }

        let stored = self
            .storage
            .get_messages(&self.channel_id, message.parents())
            .await?;
        let mut parents = Vec::with_capacity(stored.len());
        for (hash, parent) in message.parents().iter().zip(stored) {
            match parent {
                Some(p) => parents.push(p),
                None => {
                    return Err(BanError::new(format!("parent not found: {hash}")).into());
                }
            }
        }

        let mut parent_timestamps = Vec::with_capacity(parents.len());
        for parent in &parents {
            parent_timestamps.push(parent.decrypt(&self.encryption_key)?.timestamp);
        }
        let parent_max = parent_timestamps
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if !parents.is_empty() {
            for &ts in &parent_timestamps {
                if ts < parent_max - MAX_PARENT_DELTA {
                    return Err(BanError::new("parent timestamp delta exceeded").into());
                }
            }
        }

        let expected_height = parents
            .iter()
            .map(Message::height)
            .max()
            .map(|h| h + 1)
            .unwrap_or(0);
        if message.height() != expected_height {
            return Err(BanError::new("invalid height").into());
        }

        if content.timestamp > now_seconds() + FUTURE {
            return Err(BanError::new("timestamp in the future").into());
        }
        if !parents.is_empty() && content.timestamp < parent_max {
            return Err(BanError::new("timestamp below parents").into());
        }

        if message.is_root() {
            if !content.body.is_root() {
                return Err(BanError::new("first message must be a root").into());
            }
            if self.storage.get_message_count(&self.channel_id).await? > 0 {
                return Err(BanError::new("duplicate root").into());
            }
        } else {
            let MessageBody::Json(json) = &content.body else {
                return Err(BanError::new("non-root message must carry json").into());
            };
            let limit = max_json_size_for_chain(content.chain.len())
                .ok_or_else(|| BanError::new("invalid chain length"))?;
            if json.len() > limit {
                return Err(BanError::new("json body too large").into());
            }
        }

        self.storage.add_message(&message).await?;
        self.metrics.messages_received_total.inc();
        self.message_waiters
            .resolve(&message.hash().to_hex(), message.clone());
        let _ = self.updates.send(self.channel_id);
        debug!(channel = %self.name, hash = %message.hash(), height = message.height(), "message accepted");
        Ok(true)
    }

    /// Post a JSON body as `identity`, using the current fresh leaves as
    /// parents. At-most-once per returned message.
    pub async fn post(
        &self,
        body: MessageBody,
        identity: &Identity,
    ) -> Result<Message, ChannelError> {
        self.post_at(body, identity, now_seconds()).await
    }

    /// [`Channel::post`] with an explicit timestamp. The effective timestamp
    /// never regresses below the newest parent.
    pub async fn post_at(
        &self,
        body: MessageBody,
        identity: &Identity,
        timestamp: f64,
    ) -> Result<Message, ChannelError> {
        if body.is_root() {
            return Err(ChannelError::RootForbidden);
        }
        if self.is_feed && identity.public_key() != &self.public_key {
            return Err(ChannelError::FeedReadOnly);
        }

        let _guard = self.accept_lock.lock().await;
        let leaves = self.storage.get_leaves(&self.channel_id).await?;
        if leaves.is_empty() {
            let count = self.storage.get_message_count(&self.channel_id).await?;
            return Err(if count == 0 {
                ChannelError::NotSynchronized
            } else {
                ChannelError::NoLeaves
            });
        }

        let mut timestamps = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            timestamps.push(leaf.decrypt(&self.encryption_key)?.timestamp);
        }
        let max_ts = timestamps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let fresh: Vec<&Message> = leaves
            .iter()
            .zip(&timestamps)
            .filter(|&(_, &ts)| ts >= max_ts - MAX_PARENT_DELTA)
            .map(|(leaf, _)| leaf)
            .take(MAX_LEAVES_COUNT)
            .collect();
        if fresh.is_empty() {
            return Err(ChannelError::NoLeaves);
        }

        let height = fresh.iter().map(|m| m.height()).max().unwrap_or(-1) + 1;
        let parents: Vec<Hash32> = fresh.iter().map(|m| *m.hash()).collect();
        let timestamp = timestamp.max(max_ts);

        let content = identity.sign_content(&self.channel_id, &parents, height, timestamp, &body)?;
        let message = Message::seal(
            &self.encryption_key,
            &self.channel_id,
            parents,
            height,
            &content,
            None,
        )?;
        self.receive_locked(message.clone()).await?;
        self.metrics.messages_posted_total.inc();
        Ok(message)
    }

    /// Smallest height among current leaves; the sync frontier.
    pub async fn min_leaf_height(&self) -> Result<i64, ChannelError> {
        let leaves = self.storage.get_leaves(&self.channel_id).await?;
        Ok(leaves.iter().map(Message::height).min().unwrap_or(0))
    }

    /// Serve a query: a slice of abbreviated messages around the cursor.
    pub async fn query(
        &self,
        cursor: Cursor,
        is_backward: bool,
        limit: usize,
    ) -> Result<wire::QueryResponse, ChannelError> {
        let limit = limit.min(MAX_QUERY_LIMIT);
        // Clamp height cursors to the leaf frontier.
        let cursor = match cursor {
            Cursor::Height(h) => Cursor::Height(h.min(self.min_leaf_height().await?)),
            c => c,
        };
        let slice = self
            .storage
            .query(&self.channel_id, &cursor, is_backward, limit)
            .await?;
        Ok(wire::QueryResponse {
            abbreviated_messages: slice
                .messages
                .iter()
                .map(|m| wire::Abbreviated {
                    parents: m.parents().iter().map(|p| p.as_bytes().to_vec()).collect(),
                    hash: m.hash().as_bytes().to_vec(),
                })
                .collect(),
            forward_hash: slice
                .forward_hash
                .map(|h| h.as_bytes().to_vec())
                .unwrap_or_default(),
            backward_hash: slice
                .backward_hash
                .map(|h| h.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }

    /// Serve a query from its wire form.
    pub async fn handle_query(&self, q: &wire::Query) -> Result<wire::QueryResponse, ChannelError> {
        let cursor = match &q.cursor {
            Some(wire::query::Cursor::Height(h)) => Cursor::Height(*h),
            Some(wire::query::Cursor::Hash(h)) => Cursor::Hash(
                Hash32::from_slice(h).ok_or_else(|| BanError::new("invalid hash length"))?,
            ),
            None => return Err(BanError::new("missing query cursor").into()),
        };
        self.query(cursor, q.is_backward, q.limit as usize).await
    }

    /// Serve a bulk request: the stored subset of the first
    /// [`MAX_BULK_COUNT`] hashes, in input order. `forward_index` tells the
    /// client how many inputs were consumed.
    pub async fn bulk(&self, hashes: &[Hash32]) -> Result<wire::BulkResponse, ChannelError> {
        let take = hashes.len().min(MAX_BULK_COUNT);
        let fetched = self
            .storage
            .get_messages(&self.channel_id, &hashes[..take])
            .await?;
        let mut messages = Vec::new();
        let mut processed = 0u32;
        let mut total_bytes = 0usize;
        for found in fetched {
            processed += 1;
            if let Some(m) = found {
                let wm = m.to_wire();
                total_bytes += wm.encrypted_content.len();
                messages.push(wm);
                if total_bytes > MAX_BULK_RESPONSE_BYTES {
                    break;
                }
            }
        }
        Ok(wire::BulkResponse {
            messages,
            forward_index: processed,
        })
    }

    /// Serve a bulk request from its wire form.
    pub async fn handle_bulk(&self, b: &wire::Bulk) -> Result<wire::BulkResponse, ChannelError> {
        let hashes: Option<Vec<Hash32>> = b.hashes.iter().map(|h| Hash32::from_slice(h)).collect();
        let hashes = hashes.ok_or_else(|| BanError::new("invalid hash length"))?;
        self.bulk(&hashes).await
    }

    /// Discovery-and-fetch sync against a remote peer. Returns the number of
    /// newly accepted messages.
    pub async fn sync(&self, remote: &dyn RemoteChannel) -> Result<u64, ChannelError> {
        let mut is_full = false;
        let mut cursor = Cursor::Height(self.min_leaf_height().await?);
        let mut unresolved: BTreeSet<Hash32> = BTreeSet::new();
        let mut received = 0u64;

        loop {
            let is_backward = !unresolved.is_empty();
            let response = match remote
                .query(cursor.clone(), is_backward, MAX_QUERY_LIMIT as u32)
                .await
            {
                Ok(r) => r,
                Err(SyncError::Closed) => return Ok(received),
                Err(SyncError::Ban(b)) => return Err(b.into()),
            };
            if response.abbreviated_messages.len() > MAX_QUERY_LIMIT {
                return Err(BanError::new("query response overflow").into());
            }

            let mut abbreviated = Vec::with_capacity(response.abbreviated_messages.len());
            for a in &response.abbreviated_messages {
                let hash = Hash32::from_slice(&a.hash)
                    .ok_or_else(|| BanError::new("invalid hash length"))?;
                let parents: Option<Vec<Hash32>> =
                    a.parents.iter().map(|p| Hash32::from_slice(p)).collect();
                let parents = parents.ok_or_else(|| BanError::new("invalid hash length"))?;
                abbreviated.push((hash, parents));
            }

            let in_response: BTreeSet<Hash32> = abbreviated.iter().map(|(h, _)| *h).collect();
            // A parent inside the response only resolves if it is itself
            // fetchable; the response arrives in CRDT order, so one pass
            // settles transitive knownness.
            let mut known: Vec<Hash32> = Vec::new();
            let mut known_set: BTreeSet<Hash32> = BTreeSet::new();
            let mut external: BTreeSet<Hash32> = BTreeSet::new();
            for (hash, parents) in &abbreviated {
                let mut missing = Vec::new();
                for parent in parents {
                    if known_set.contains(parent)
                        || self.storage.has_message(&self.channel_id, parent).await?
                    {
                        continue;
                    }
                    missing.push(*parent);
                }
                if missing.is_empty() {
                    if self.storage.has_message(&self.channel_id, hash).await? {
                        known_set.insert(*hash);
                    } else if known_set.insert(*hash) {
                        known.push(*hash);
                    }
                } else {
                    external.extend(missing);
                }
            }
            if is_full && !external.is_empty() {
                return Err(BanError::new("missing parent in full sync").into());
            }

            let mut offset = 0usize;
            while offset < known.len() {
                let slice = &known[offset..known.len().min(offset + MAX_BULK_COUNT)];
                let bulk = match remote.bulk(slice).await {
                    Ok(r) => r,
                    Err(SyncError::Closed) => return Ok(received),
                    Err(SyncError::Ban(b)) => return Err(b.into()),
                };
                if bulk.messages.len() > slice.len() {
                    return Err(BanError::new("bulk response overflow").into());
                }
                for wm in &bulk.messages {
                    let message = Message::from_wire(wm)?;
                    if self.receive(message).await? {
                        received += 1;
                    }
                }
                let advanced = bulk.forward_index as usize;
                if advanced == 0 {
                    // Empty (timed-out) response; retried on the next run.
                    break;
                }
                offset += advanced.min(slice.len());
            }

            for hash in &in_response {
                unresolved.remove(hash);
            }
            unresolved.extend(external.iter().copied());

            if unresolved.len() > crate::core::constants::MAX_UNRESOLVED_COUNT {
                if is_full {
                    return Err(BanError::new("unresolved overflow in full sync").into());
                }
                debug!(channel = %self.name, "unresolved overflow; falling back to full sync");
                is_full = true;
                unresolved.clear();
                cursor = Cursor::Height(0);
                continue;
            }

            let next = if unresolved.is_empty() {
                optional_hash(&response.forward_hash)?
            } else {
                optional_hash(&response.backward_hash)?
            };
            match next {
                Some(hash) => cursor = Cursor::Hash(hash),
                None => break,
            }
        }
        Ok(received)
    }

    /// Serialize for the entity store.
    pub fn to_entity(&self, owner_pub_hex: Option<String>) -> Result<Vec<u8>, CodecError> {
        encode_canonical(&ChannelRecord {
            public_key: self.public_key,
            name: self.name.clone(),
            is_feed: self.is_feed,
            owner_pub_hex,
        })
    }

    /// Decode a persisted channel record.
    pub fn record_from_entity(bytes: &[u8]) -> Result<ChannelRecord, CodecError> {
        decode_canonical_limited(bytes, MAX_ENTITY_SIZE)
    }
}

fn optional_hash(bytes: &[u8]) -> Result<Option<Hash32>, ChannelError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Hash32::from_slice(bytes)
        .map(Some)
        .ok_or_else(|| BanError::new("invalid hash length").into())
}
