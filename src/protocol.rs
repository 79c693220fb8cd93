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

//! The top-level protocol container: identities, channels, peers, storage
//! binding and wait-lists.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::core::channel::{Channel, ChannelError};
use crate::core::config::NodeConfig;
use crate::core::constants::DEFAULT_SYNC_TIMEOUT;
use crate::core::identity::Identity;
use crate::core::security::crypto;
use crate::core::types::{ChannelId, Hash32, PeerId, RequestId};
use crate::core::wait_list::{WaitError, WaitList, Waiter};
use crate::core::wire;
use crate::monitoring::metrics::Metrics;
use crate::networking::peer::{run_peer, PeerError, PeerHandle};
use crate::storage::{Storage, StorageError};

/// Entity prefix for channels.
const CHANNEL_PREFIX: &str = "channel";
/// Entity prefix for identities.
const IDENTITY_PREFIX: &str = "identity";
/// Update broadcast depth; slow peers coalesce through their sync agents.
const UPDATES_CAPACITY: usize = 256;

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("duplicate identity name")]
    DuplicateIdentity,
    #[error("duplicate channel name")]
    DuplicateChannel,
    #[error("unknown peer")]
    UnknownPeer,
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),
    #[error("metrics")]
    Metrics,
    #[error("codec")]
    Codec,
}

pub(crate) struct PeerEntry {
    pub(crate) handle: PeerHandle,
    pub(crate) shutdown: mpsc::Sender<String>,
}

/// State shared between the protocol front and its peer sessions.
pub(crate) struct Shared {
    pub(crate) peer_id: PeerId,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) channels: RwLock<BTreeMap<ChannelId, Arc<Channel>>>,
    pub(crate) channels_by_name: RwLock<BTreeMap<String, ChannelId>>,
    pub(crate) owners: RwLock<BTreeMap<ChannelId, Arc<Identity>>>,
    pub(crate) identities: RwLock<BTreeMap<String, Arc<Identity>>>,
    pub(crate) peers: Mutex<BTreeMap<PeerId, PeerEntry>>,
    pub(crate) invite_waiters: WaitList<wire::EncryptedInvite>,
    pub(crate) peer_waiters: WaitList<PeerHandle>,
    pub(crate) updates_tx: broadcast::Sender<ChannelId>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) sync_timeout: Duration,
}

/// A self-contained protocol instance. No global state; run as many as
/// needed, one per logical node.
pub struct Protocol {
    shared: Arc<Shared>,
}

impl Protocol {
    /// Create a protocol bound to `storage` with default tuning.
    pub fn new(storage: Arc<dyn Storage>) -> Result<Self, ProtocolError> {
        Self::with_timeout(storage, DEFAULT_SYNC_TIMEOUT)
    }

    /// Create a protocol with settings from a node config.
    pub fn from_config(
        storage: Arc<dyn Storage>,
        config: &NodeConfig,
    ) -> Result<Self, ProtocolError> {
        Self::with_timeout(storage, Duration::from_secs(config.sync.timeout_secs))
    }

    /// Create a protocol with an explicit sync request timeout.
    pub fn with_timeout(
        storage: Arc<dyn Storage>,
        sync_timeout: Duration,
    ) -> Result<Self, ProtocolError> {
        let metrics = Arc::new(Metrics::new().map_err(|_| ProtocolError::Metrics)?);
        let (updates_tx, _) = broadcast::channel(UPDATES_CAPACITY);
        Ok(Self {
            shared: Arc::new(Shared {
                peer_id: Hash32::from_bytes(crypto::random_bytes()),
                storage,
                channels: RwLock::new(BTreeMap::new()),
                channels_by_name: RwLock::new(BTreeMap::new()),
                owners: RwLock::new(BTreeMap::new()),
                identities: RwLock::new(BTreeMap::new()),
                peers: Mutex::new(BTreeMap::new()),
                invite_waiters: WaitList::new(),
                peer_waiters: WaitList::new(),
                updates_tx,
                metrics,
                sync_timeout,
            }),
        })
    }

    /// This instance's peer id, sent in hellos.
    pub fn peer_id(&self) -> &PeerId {
        &self.shared.peer_id
    }

    /// Metrics registry handle.
    pub fn metrics(&self) -> Arc<Metrics> {
        self.shared.metrics.clone()
    }

    /// Read persisted identities and channels from storage.
    pub async fn load(&self) -> Result<(), ProtocolError> {
        for key in self
            .shared
            .storage
            .get_entity_keys(IDENTITY_PREFIX)
            .await?
        {
            let Some(blob) = self
                .shared
                .storage
                .retrieve_entity(IDENTITY_PREFIX, &key)
                .await?
            else {
                continue;
            };
            match Identity::from_entity(&blob) {
                Ok(identity) => {
                    self.shared
                        .identities
                        .write()
                        .expect("identities lock")
                        .insert(identity.name().to_string(), Arc::new(identity));
                }
                Err(_) => warn!(key = %key, "skipping undecodable identity entity"),
            }
        }

        for key in self.shared.storage.get_entity_keys(CHANNEL_PREFIX).await? {
            let Some(blob) = self
                .shared
                .storage
                .retrieve_entity(CHANNEL_PREFIX, &key)
                .await?
            else {
                continue;
            };
            let record = match Channel::record_from_entity(&blob) {
                Ok(r) => r,
                Err(_) => {
                    warn!(key = %key, "skipping undecodable channel entity");
                    continue;
                }
            };
            let channel = Channel::new(
                record.public_key,
                &record.name,
                record.is_feed,
                self.shared.storage.clone(),
                self.shared.metrics.clone(),
                self.shared.updates_tx.clone(),
            )?;
            let owner = record.owner_pub_hex.as_deref().and_then(|owner_hex| {
                self.shared
                    .identities
                    .read()
                    .expect("identities lock")
                    .values()
                    .find(|i| hex::encode(i.public_key()) == owner_hex)
                    .cloned()
            });
            let channel = Arc::new(channel);
            self.shared
                .channels
                .write()
                .expect("channels lock")
                .insert(*channel.id(), channel.clone());
            self.shared
                .channels_by_name
                .write()
                .expect("channel names lock")
                .insert(channel.name().to_string(), *channel.id());
            if let Some(owner) = owner {
                self.shared
                    .owners
                    .write()
                    .expect("owners lock")
                    .insert(*channel.id(), owner);
            }
        }
        info!(
            identities = self.shared.identities.read().expect("identities lock").len(),
            channels = self.shared.channels.read().expect("channels lock").len(),
            "protocol state loaded"
        );
        Ok(())
    }

    /// Create an identity and its companion channel of the same name.
    pub async fn create_identity(
        &self,
        name: &str,
    ) -> Result<(Arc<Identity>, Arc<Channel>), ProtocolError> {
        if self
            .shared
            .identities
            .read()
            .expect("identities lock")
            .contains_key(name)
        {
            return Err(ProtocolError::DuplicateIdentity);
        }
        if self
            .shared
            .channels_by_name
            .read()
            .expect("channel names lock")
            .contains_key(name)
        {
            return Err(ProtocolError::DuplicateChannel);
        }

        let identity = Arc::new(Identity::new(name));
        let channel = Channel::create(
            &identity,
            name,
            self.shared.storage.clone(),
            self.shared.metrics.clone(),
            self.shared.updates_tx.clone(),
        )
        .await?;
        let channel = self
            .register_channel(channel, Some(identity.clone()))
            .await?;
        self.shared
            .identities
            .write()
            .expect("identities lock")
            .insert(name.to_string(), identity.clone());
        self.save_identity(&identity).await?;
        info!(name = %name, "identity created");
        Ok((identity, channel))
    }

    /// Register an externally constructed channel; rejects duplicate names.
    pub async fn add_channel(&self, channel: Channel) -> Result<Arc<Channel>, ProtocolError> {
        self.register_channel(channel, None).await
    }

    /// Join a channel from a decrypted invite addressed to `identity`.
    pub async fn channel_from_invite(
        &self,
        invite: &wire::Invite,
        identity: &Arc<Identity>,
    ) -> Result<Arc<Channel>, ProtocolError> {
        let channel = Channel::from_invite(
            invite,
            identity,
            self.shared.storage.clone(),
            self.shared.metrics.clone(),
            self.shared.updates_tx.clone(),
        )?;
        let channel = self
            .register_channel(channel, Some(identity.clone()))
            .await?;
        self.save_identity(identity).await?;
        // Nudge connected peers so their agents pick up the new channel.
        let _ = self.shared.updates_tx.send(*channel.id());
        info!(channel = %channel.name(), "joined channel from invite");
        Ok(channel)
    }

    /// Subscribe to a read-only feed by its public key.
    pub async fn add_feed(
        &self,
        public_key: [u8; 32],
        name: &str,
    ) -> Result<Arc<Channel>, ProtocolError> {
        let channel = Channel::new(
            public_key,
            name,
            true,
            self.shared.storage.clone(),
            self.shared.metrics.clone(),
            self.shared.updates_tx.clone(),
        )?;
        let channel = self.register_channel(channel, None).await?;
        let _ = self.shared.updates_tx.send(*channel.id());
        Ok(channel)
    }

    async fn register_channel(
        &self,
        channel: Channel,
        owner: Option<Arc<Identity>>,
    ) -> Result<Arc<Channel>, ProtocolError> {
        {
            let names = self
                .shared
                .channels_by_name
                .read()
                .expect("channel names lock");
            if names.contains_key(channel.name()) {
                return Err(ProtocolError::DuplicateChannel);
            }
        }
        let channel = Arc::new(channel);
        self.shared
            .channels
            .write()
            .expect("channels lock")
            .insert(*channel.id(), channel.clone());
        self.shared
            .channels_by_name
            .write()
            .expect("channel names lock")
            .insert(channel.name().to_string(), *channel.id());
        let owner_pub_hex = owner.as_ref().map(|o| hex::encode(o.public_key()));
        if let Some(owner) = owner {
            self.shared
                .owners
                .write()
                .expect("owners lock")
                .insert(*channel.id(), owner);
        }
        let blob = channel
            .to_entity(owner_pub_hex)
            .map_err(|_| ProtocolError::Codec)?;
        self.shared
            .storage
            .store_entity(CHANNEL_PREFIX, &channel.id().to_hex(), &blob)
            .await?;
        Ok(channel)
    }

    /// Persist an identity entity (called again whenever chains change).
    pub async fn save_identity(&self, identity: &Identity) -> Result<(), ProtocolError> {
        let blob = identity.to_entity().map_err(|_| ProtocolError::Codec)?;
        self.shared
            .storage
            .store_entity(IDENTITY_PREFIX, &hex::encode(identity.public_key()), &blob)
            .await?;
        Ok(())
    }

    /// Remove an identity and wipe its secret key.
    pub async fn remove_identity(&self, name: &str) -> Result<(), ProtocolError> {
        let removed = self
            .shared
            .identities
            .write()
            .expect("identities lock")
            .remove(name);
        if let Some(identity) = removed {
            self.shared
                .storage
                .remove_entity(IDENTITY_PREFIX, &hex::encode(identity.public_key()))
                .await?;
            // The signing key zeroizes when the last reference drops.
        }
        Ok(())
    }

    /// Look up an identity by name.
    pub fn get_identity(&self, name: &str) -> Option<Arc<Identity>> {
        self.shared
            .identities
            .read()
            .expect("identities lock")
            .get(name)
            .cloned()
    }

    /// Look up a channel by id.
    pub fn get_channel(&self, id: &ChannelId) -> Option<Arc<Channel>> {
        self.shared
            .channels
            .read()
            .expect("channels lock")
            .get(id)
            .cloned()
    }

    /// Look up a channel by name.
    pub fn get_channel_by_name(&self, name: &str) -> Option<Arc<Channel>> {
        let id = *self
            .shared
            .channels_by_name
            .read()
            .expect("channel names lock")
            .get(name)?;
        self.get_channel(&id)
    }

    /// All registered channels.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.shared
            .channels
            .read()
            .expect("channels lock")
            .values()
            .cloned()
            .collect()
    }

    /// Run a peer session over an established socket until it ends.
    pub async fn connect<S>(&self, socket: S) -> Result<(), PeerError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        run_peer(self.shared.clone(), socket).await
    }

    /// Park until the invite for `request_id` arrives from some peer.
    pub fn wait_for_invite(&self, request_id: &RequestId) -> Waiter<wire::EncryptedInvite> {
        self.shared.invite_waiters.wait_for(&request_id.to_hex())
    }

    /// Resolve once the peer with `peer_id` is connected. Returns right away
    /// when the session already exists.
    pub async fn wait_for_peer(&self, peer_id: &PeerId) -> Result<PeerHandle, WaitError> {
        // Register the waiter first; sessions insert into the peer map
        // before resolving, so one of the two paths always observes them.
        let waiter = self.shared.peer_waiters.wait_for(&peer_id.to_hex());
        if let Some(entry) = self.shared.peers.lock().expect("peers lock").get(peer_id) {
            return Ok(entry.handle.clone());
        }
        waiter.wait().await
    }

    /// Send an encrypted invite to a connected peer.
    pub async fn send_invite(
        &self,
        peer_id: &PeerId,
        invite: wire::EncryptedInvite,
    ) -> Result<(), ProtocolError> {
        let outbound = {
            let peers = self.shared.peers.lock().expect("peers lock");
            peers
                .get(peer_id)
                .map(|entry| entry.handle.outbound.clone())
        };
        let outbound = outbound.ok_or(ProtocolError::UnknownPeer)?;
        let packet = wire::Packet {
            content: Some(wire::packet::Content::Invite(invite)),
        };
        outbound.send(packet).await.map_err(|_| ProtocolError::UnknownPeer)
    }

    /// Destroy all peer sessions and fail all waiters.
    pub async fn close(&self) {
        let shutdowns: Vec<mpsc::Sender<String>> = {
            let peers = self.shared.peers.lock().expect("peers lock");
            peers.values().map(|entry| entry.shutdown.clone()).collect()
        };
        futures::future::join_all(
            shutdowns
                .iter()
                .map(|shutdown| shutdown.send("shutting down".to_string())),
        )
        .await;
        self.shared.invite_waiters.close();
        self.shared.peer_waiters.close();
        info!("protocol closed");
    }
}
