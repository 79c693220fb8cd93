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

//! One peer session per socket: hello handshake, packet dispatch,
//! notification propagation and ban handling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::core::channel::Channel;
use crate::core::constants::VERSION;
use crate::core::error::BanError;
use crate::core::types::{ChannelId, Hash32, PeerId};
use crate::core::wire;
use crate::networking::socket::{frame_socket, FrameWriter, SocketError};
use crate::networking::sync_agent::SyncAgent;
use crate::protocol::Shared;

/// Time allowed for the remote hello.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
/// Liveness ping cadence.
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Outbound packet queue depth per session.
const OUTBOUND_QUEUE: usize = 64;

/// Peer session errors.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error(transparent)]
    Ban(#[from] BanError),
    #[error("handshake: {0}")]
    Handshake(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("socket: {0}")]
    Socket(#[from] SocketError),
    #[error("closed")]
    Closed,
}

/// Cloneable handle for sending packets to a connected peer.
#[derive(Clone)]
pub struct PeerHandle {
    /// Remote peer id from its hello.
    pub remote_id: PeerId,
    /// Outbound packet queue of the session.
    pub outbound: mpsc::Sender<wire::Packet>,
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("remote_id", &self.remote_id)
            .finish()
    }
}

fn error_packet(reason: String) -> wire::Packet {
    wire::Packet {
        content: Some(wire::packet::Content::Error(wire::Error { reason })),
    }
}

fn notification_packet(channel_id: &ChannelId) -> wire::Packet {
    wire::Packet {
        content: Some(wire::packet::Content::Notification(wire::Notification {
            channel_id: channel_id.as_bytes().to_vec(),
        })),
    }
}

struct Session {
    shared: Arc<Shared>,
    remote_id: PeerId,
    outbound: mpsc::Sender<wire::Packet>,
    ban_tx: mpsc::Sender<BanError>,
    agents: BTreeMap<ChannelId, Arc<SyncAgent>>,
}

impl Session {
    fn channel_by_bytes(&self, id: &[u8]) -> Result<Option<Arc<Channel>>, PeerError> {
        let id = Hash32::from_slice(id)
            .ok_or_else(|| BanError::new("invalid channel id length"))?;
        Ok(self
            .shared
            .channels
            .read()
            .expect("channels lock")
            .get(&id)
            .cloned())
    }

    fn agent_for(&mut self, channel: &Arc<Channel>) -> Arc<SyncAgent> {
        self.agents
            .entry(*channel.id())
            .or_insert_with(|| {
                let identity = self
                    .shared
                    .owners
                    .read()
                    .expect("owners lock")
                    .get(channel.id())
                    .cloned();
                Arc::new(SyncAgent::new(
                    channel.clone(),
                    identity,
                    self.outbound.clone(),
                    self.ban_tx.clone(),
                    self.shared.metrics.clone(),
                    self.shared.sync_timeout,
                ))
            })
            .clone()
    }

    async fn dispatch(&mut self, packet: wire::Packet) -> Result<(), PeerError> {
        use wire::packet::Content;
        match packet.content {
            None => Err(BanError::new("empty packet").into()),
            Some(Content::Error(e)) => Err(PeerError::Remote(e.reason)),
            Some(Content::Invite(invite)) => {
                let request_id = hex::encode(&invite.request_id);
                if self
                    .shared
                    .invite_waiters
                    .resolve(&request_id, invite.clone())
                    > 0
                {
                    self.shared.metrics.invites_relayed_total.inc();
                } else {
                    debug!(peer = %self.remote_id, "dropping unsolicited invite");
                }
                Ok(())
            }
            Some(Content::SyncRequest(request)) => {
                let Some(channel) = self.channel_by_bytes(&request.channel_id)? else {
                    debug!(peer = %self.remote_id, "sync request for unknown channel");
                    return Ok(());
                };
                let agent = self.agent_for(&channel);
                match agent.receive_request(&request).await {
                    Ok(response) => {
                        let _ = self.outbound.send(response).await;
                        Ok(())
                    }
                    Err(e) => match e.ban_reason() {
                        Some(reason) => Err(BanError::new(reason).into()),
                        None => {
                            self.shared.metrics.invalid_packets_total.inc();
                            warn!(peer = %self.remote_id, err = %e, "sync request failed");
                            Ok(())
                        }
                    },
                }
            }
            Some(Content::SyncResponse(response)) => {
                let Some(channel) = self.channel_by_bytes(&response.channel_id)? else {
                    debug!(peer = %self.remote_id, "sync response for unknown channel");
                    return Ok(());
                };
                let Some(agent) = self.agents.get(channel.id()).cloned() else {
                    return Err(BanError::new("unexpected response seq").into());
                };
                match agent.receive_response(&response) {
                    Ok(()) => Ok(()),
                    Err(e) => match e.ban_reason() {
                        Some(reason) => Err(BanError::new(reason).into()),
                        None => {
                            self.shared.metrics.invalid_packets_total.inc();
                            warn!(peer = %self.remote_id, err = %e, "sync response dropped");
                            Ok(())
                        }
                    },
                }
            }
            Some(Content::Notification(n)) => {
                let Some(channel) = self.channel_by_bytes(&n.channel_id)? else {
                    return Ok(());
                };
                self.agent_for(&channel).synchronize();
                Ok(())
            }
            Some(Content::Ping(p)) => {
                let pong = wire::Packet {
                    content: Some(wire::packet::Content::Pong(wire::Pong { seq: p.seq })),
                };
                let _ = self.outbound.send(pong).await;
                Ok(())
            }
            Some(Content::Pong(_)) => Ok(()),
        }
    }
}

async fn reject<W: AsyncWrite + Unpin>(writer: &mut FrameWriter<W>, reason: &str) {
    let packet = error_packet(reason.to_string());
    let _ = writer.send_frame(&wire::encode(&packet)).await;
    writer.shutdown().await;
}

/// Run one peer session to completion: handshake, packet loop, teardown.
pub(crate) async fn run_peer<S>(shared: Arc<Shared>, socket: S) -> Result<(), PeerError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = frame_socket(socket);

    let hello = wire::Hello {
        version: VERSION,
        peer_id: shared.peer_id.as_bytes().to_vec(),
    };
    writer.send_frame(&wire::encode(&hello)).await?;
    let frame = match tokio::time::timeout(HANDSHAKE_TIMEOUT, reader.next_frame()).await {
        Err(_) => return Err(PeerError::Handshake("hello timeout".to_string())),
        Ok(frame) => frame?.ok_or(PeerError::Closed)?,
    };
    let remote_hello = wire::decode_hello(&frame)?;
    if remote_hello.version != VERSION {
        reject(&mut writer, "unsupported version").await;
        return Err(PeerError::Handshake(format!(
            "unsupported version {}",
            remote_hello.version
        )));
    }
    let Some(remote_id) = Hash32::from_slice(&remote_hello.peer_id) else {
        reject(&mut writer, "invalid peer id").await;
        return Err(PeerError::Handshake("invalid peer id length".to_string()));
    };

    let (outbound, mut outbound_rx) = mpsc::channel::<wire::Packet>(OUTBOUND_QUEUE);
    let writer_task = tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if writer.send_frame(&wire::encode(&packet)).await.is_err() {
                break;
            }
        }
        writer.shutdown().await;
    });

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<String>(1);
    let handle = PeerHandle {
        remote_id,
        outbound: outbound.clone(),
    };
    shared.peers.lock().expect("peers lock").insert(
        remote_id,
        crate::protocol::PeerEntry {
            handle: handle.clone(),
            shutdown: shutdown_tx,
        },
    );
    shared.peer_waiters.resolve(&remote_id.to_hex(), handle);
    shared.metrics.peers.inc();
    info!(peer = %remote_id, "peer connected");

    let (ban_tx, mut ban_rx) = mpsc::channel::<BanError>(4);
    let mut session = Session {
        shared: shared.clone(),
        remote_id,
        outbound: outbound.clone(),
        ban_tx,
        agents: BTreeMap::new(),
    };

    let mut updates_rx = shared.updates_tx.subscribe();
    let known: Vec<Arc<Channel>> = shared
        .channels
        .read()
        .expect("channels lock")
        .values()
        .cloned()
        .collect();
    for channel in &known {
        session.agent_for(channel).synchronize();
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.tick().await; // the first tick fires immediately
    let mut ping_seq = 0u32;

    let result: Result<(), PeerError> = loop {
        tokio::select! {
            frame = reader.next_frame() => {
                match frame {
                    Ok(Some(bytes)) => {
                        match wire::decode_packet(&bytes) {
                            Ok(packet) => {
                                if let Err(e) = session.dispatch(packet).await {
                                    break Err(e);
                                }
                            }
                            Err(ban) => {
                                shared.metrics.invalid_packets_total.inc();
                                break Err(ban.into());
                            }
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(SocketError::FrameTooLarge) => {
                        break Err(BanError::new("frame too large").into());
                    }
                    Err(_) => break Ok(()),
                }
            }
            update = updates_rx.recv() => {
                match update {
                    Ok(channel_id) => {
                        // New local message (or a channel joined mid-session):
                        // notify the remote, and make sure we track the channel.
                        if !session.agents.contains_key(&channel_id) {
                            if let Ok(Some(channel)) =
                                session.channel_by_bytes(channel_id.as_bytes())
                            {
                                session.agent_for(&channel).synchronize();
                            }
                        }
                        let _ = session.outbound.send(notification_packet(&channel_id)).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(peer = %remote_id, skipped, "update stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break Ok(()),
                }
            }
            Some(ban) = ban_rx.recv() => break Err(ban.into()),
            Some(reason) = shutdown_rx.recv() => {
                let _ = session.outbound.send(error_packet(reason)).await;
                break Ok(());
            }
            _ = ping_interval.tick() => {
                ping_seq = ping_seq.wrapping_add(1);
                let ping = wire::Packet {
                    content: Some(wire::packet::Content::Ping(wire::Ping { seq: ping_seq })),
                };
                let _ = session.outbound.send(ping).await;
            }
        }
    };

    match &result {
        Err(PeerError::Ban(ban)) => {
            warn!(peer = %remote_id, reason = %ban.reason, "banning peer");
            shared.metrics.bans_total.inc();
            let _ = outbound.send(error_packet(ban.wire_reason())).await;
        }
        Err(PeerError::Remote(reason)) => {
            info!(peer = %remote_id, reason = %reason, "remote closed session");
        }
        Err(e) => warn!(peer = %remote_id, err = %e, "peer session failed"),
        Ok(()) => info!(peer = %remote_id, "peer disconnected"),
    }

    for agent in session.agents.values() {
        agent.destroy();
    }
    {
        let mut peers = shared.peers.lock().expect("peers lock");
        if let Some(entry) = peers.get(&remote_id) {
            if entry.handle.outbound.same_channel(&outbound) {
                peers.remove(&remote_id);
            }
        }
    }
    shared.metrics.peers.dec();
    drop(session);
    drop(outbound);
    // The writer drains the queued error packet and shuts the stream down
    // once the remaining agent handles drop.
    drop(writer_task);
    result
}
