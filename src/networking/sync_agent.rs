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

//! Per-(peer, channel) synchronization agent.
//!
//! The agent is both the client driver (it implements [`RemoteChannel`] by
//! sealing requests into `SyncRequest` packets and demuxing responses by
//! seq) and the server endpoint for the remote's requests on this channel.
//!
//! Re-entry coalesces through a three-state machine: a `synchronize()` call
//! during an active run parks exactly one restart; further calls fold into
//! it.

use prost::Message as ProstMessage;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::core::chain::Chain;
use crate::core::channel::{Channel, ChannelError, RemoteChannel, SyncError};
use crate::core::constants::{FUTURE, NONCE_SIZE};
use crate::core::error::BanError;
use crate::core::identity::Identity;
use crate::core::security::crypto;
use crate::core::types::{now_seconds, Hash32};
use crate::core::wire;
use crate::monitoring::metrics::Metrics;
use crate::storage::Cursor;

use async_trait::async_trait;

/// Agent states; see the module docs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AgentState {
    Idle,
    Active,
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RequestKind {
    Query,
    Bulk,
}

type Response = wire::sync_response::content::Response;

/// Synchronization agent for one channel over one peer session.
pub struct SyncAgent {
    channel: Arc<Channel>,
    identity: Option<Arc<Identity>>,
    outbound: mpsc::Sender<wire::Packet>,
    ban_tx: mpsc::Sender<BanError>,
    metrics: Arc<Metrics>,
    timeout: Duration,
    seq: Mutex<u32>,
    pending: Mutex<BTreeMap<u32, (RequestKind, oneshot::Sender<Response>)>>,
    state: Mutex<AgentState>,
    destroyed: AtomicBool,
}

impl SyncAgent {
    /// Create an agent. `identity` signs outgoing requests; feeds leave it
    /// unused and send unsigned (ephemeral) requests.
    pub fn new(
        channel: Arc<Channel>,
        identity: Option<Arc<Identity>>,
        outbound: mpsc::Sender<wire::Packet>,
        ban_tx: mpsc::Sender<BanError>,
        metrics: Arc<Metrics>,
        timeout: Duration,
    ) -> Self {
        Self {
            channel,
            identity,
            outbound,
            ban_tx,
            metrics,
            timeout,
            seq: Mutex::new(0),
            pending: Mutex::new(BTreeMap::new()),
            state: Mutex::new(AgentState::Idle),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Trigger a sync run. Calls during an active run coalesce into at most
    /// one restart.
    pub fn synchronize(self: Arc<Self>) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }
        let mut state = self.state.lock().expect("agent state lock");
        match *state {
            AgentState::Idle => {
                *state = AgentState::Active;
                drop(state);
                let agent = self.clone();
                tokio::spawn(async move { agent.run().await });
            }
            AgentState::Active => *state = AgentState::Pending,
            AgentState::Pending => {}
        }
    }

    async fn run(self: Arc<Self>) {
        loop {
            self.metrics.sync_runs_total.inc();
            match self.channel.sync(self.as_ref()).await {
                Ok(count) => {
                    debug!(channel = %self.channel.name(), received = count, "sync run finished");
                }
                Err(e) => match e.ban_reason() {
                    Some(reason) => {
                        let _ = self.ban_tx.send(BanError::new(reason)).await;
                        break;
                    }
                    None => {
                        warn!(channel = %self.channel.name(), err = %e, "sync run failed");
                    }
                },
            }
            let mut state = self.state.lock().expect("agent state lock");
            if *state == AgentState::Pending && !self.destroyed.load(Ordering::SeqCst) {
                // Restart exactly once for the coalesced calls.
                *state = AgentState::Active;
            } else {
                *state = AgentState::Idle;
                break;
            }
        }
    }

    /// Fail all in-flight requests and refuse new ones.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.pending.lock().expect("agent pending lock").clear();
    }

    fn next_seq(&self) -> u32 {
        let mut seq = self.seq.lock().expect("agent seq lock");
        let value = *seq;
        *seq = seq.wrapping_add(1);
        value
    }

    fn build_content(
        &self,
        request: wire::sync_request::content::Request,
    ) -> Result<wire::sync_request::Content, SyncError> {
        let mut content = wire::sync_request::Content {
            chain: Vec::new(),
            timestamp: now_seconds(),
            signature: Vec::new(),
            request: Some(request),
        };
        if !self.channel.is_feed() {
            let identity = self.identity.as_ref().ok_or(SyncError::Closed)?;
            let chain = identity
                .get_chain(self.channel.id())
                .ok_or(SyncError::Closed)?;
            content.chain = chain.to_wire();
            let tbs = wire::sync_request_tbs_bytes(&content, self.channel.id().as_bytes());
            content.signature = identity.sign(&tbs).to_vec();
        }
        Ok(content)
    }

    async fn request(
        &self,
        request: wire::sync_request::content::Request,
        kind: RequestKind,
    ) -> Result<Option<Response>, SyncError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(SyncError::Closed);
        }
        let content = self.build_content(request)?;
        let (nonce, sealed) = self
            .channel
            .encrypt(&wire::encode(&content))
            .map_err(|_| SyncError::Closed)?;

        let seq = self.next_seq();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("agent pending lock")
            .insert(seq, (kind, tx));

        let packet = wire::Packet {
            content: Some(wire::packet::Content::SyncRequest(wire::SyncRequest {
                channel_id: self.channel.id().as_bytes().to_vec(),
                seq,
                nonce: nonce.to_vec(),
                box_data: sealed,
            })),
        };
        if self.outbound.send(packet).await.is_err() {
            self.pending.lock().expect("agent pending lock").remove(&seq);
            return Err(SyncError::Closed);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            // Slow remote: resolve empty rather than ban; retried later.
            Err(_) => {
                self.pending.lock().expect("agent pending lock").remove(&seq);
                debug!(channel = %self.channel.name(), seq, "sync request timed out");
                Ok(None)
            }
            Ok(Err(_)) => Err(SyncError::Closed),
            Ok(Ok(response)) => Ok(Some(response)),
        }
    }

    /// Route a decrypted response to its request by seq. Unknown seqs and
    /// kind mismatches are protocol violations.
    fn resolve(&self, seq: u32, response: Response) -> Result<(), BanError> {
        let mut pending = self.pending.lock().expect("agent pending lock");
        let Some((kind, tx)) = pending.remove(&seq) else {
            return Err(BanError::new("unexpected response seq"));
        };
        match (kind, &response) {
            (RequestKind::Query, Response::Query(_)) | (RequestKind::Bulk, Response::Bulk(_)) => {
                let _ = tx.send(response);
                Ok(())
            }
            (RequestKind::Bulk, Response::Query(_)) => {
                Err(BanError::new("expected bulk response"))
            }
            (RequestKind::Query, Response::Bulk(_)) => {
                Err(BanError::new("unexpected bulk response"))
            }
        }
    }

    /// Handle an incoming `SyncResponse` packet for this channel.
    pub fn receive_response(&self, response: &wire::SyncResponse) -> Result<(), ChannelError> {
        if response.box_data.len() < NONCE_SIZE {
            return Err(BanError::new("invalid sync response box").into());
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&response.box_data[..NONCE_SIZE]);
        let plaintext = self
            .channel
            .decrypt(&response.box_data[NONCE_SIZE..], &nonce)?;
        let content = wire::sync_response::Content::decode(plaintext.as_slice())
            .map_err(|_| BanError::new("invalid sync response encoding"))?;
        let inner = content
            .response
            .ok_or_else(|| BanError::new("missing sync response content"))?;
        self.resolve(response.seq, inner)?;
        Ok(())
    }

    /// Serve an incoming `SyncRequest` packet for this channel, producing
    /// the sealed response packet.
    pub async fn receive_request(
        &self,
        request: &wire::SyncRequest,
    ) -> Result<wire::Packet, ChannelError> {
        let nonce: [u8; NONCE_SIZE] = request
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| BanError::new("invalid nonce length"))?;
        let plaintext = self.channel.decrypt(&request.box_data, &nonce)?;
        let content = wire::sync_request::Content::decode(plaintext.as_slice())
            .map_err(|_| BanError::new("invalid sync request encoding"))?;

        if content.timestamp > now_seconds() + FUTURE {
            return Err(BanError::new("sync request from the future").into());
        }
        if !self.channel.is_feed() {
            let chain = Chain::from_wire(&content.chain)
                .map_err(|_| BanError::new("invalid signature or chain"))?;
            let leaf = chain
                .verify(
                    self.channel.public_key(),
                    self.channel.id(),
                    content.timestamp,
                )
                .map_err(|_| BanError::new("invalid signature or chain"))?;
            let tbs = wire::sync_request_tbs_bytes(&content, self.channel.id().as_bytes());
            if !crypto::verify(&leaf, &tbs, &content.signature) {
                return Err(BanError::new("invalid sync request signature").into());
            }
        }

        let response = match &content.request {
            Some(wire::sync_request::content::Request::Query(q)) => {
                Response::Query(self.channel.handle_query(q).await?)
            }
            Some(wire::sync_request::content::Request::Bulk(b)) => {
                Response::Bulk(self.channel.handle_bulk(b).await?)
            }
            None => return Err(BanError::new("missing sync request content").into()),
        };

        let sealed_content = wire::sync_response::Content {
            response: Some(response),
        };
        let (nonce, sealed) = self.channel.encrypt(&wire::encode(&sealed_content))?;
        let mut box_data = nonce.to_vec();
        box_data.extend_from_slice(&sealed);
        Ok(wire::Packet {
            content: Some(wire::packet::Content::SyncResponse(wire::SyncResponse {
                channel_id: self.channel.id().as_bytes().to_vec(),
                seq: request.seq,
                box_data,
            })),
        })
    }
}

#[async_trait]
impl RemoteChannel for SyncAgent {
    async fn query(
        &self,
        cursor: Cursor,
        is_backward: bool,
        limit: u32,
    ) -> Result<wire::QueryResponse, SyncError> {
        let cursor = match cursor {
            Cursor::Height(h) => wire::query::Cursor::Height(h),
            Cursor::Hash(h) => wire::query::Cursor::Hash(h.as_bytes().to_vec()),
        };
        let query = wire::Query {
            cursor: Some(cursor),
            is_backward,
            limit,
        };
        match self
            .request(
                wire::sync_request::content::Request::Query(query),
                RequestKind::Query,
            )
            .await?
        {
            Some(Response::Query(r)) => Ok(r),
            // Timed out: behave as an empty response.
            _ => Ok(wire::QueryResponse::default()),
        }
    }

    async fn bulk(&self, hashes: &[Hash32]) -> Result<wire::BulkResponse, SyncError> {
        let bulk = wire::Bulk {
            hashes: hashes.iter().map(|h| h.as_bytes().to_vec()).collect(),
        };
        match self
            .request(
                wire::sync_request::content::Request::Bulk(bulk),
                RequestKind::Bulk,
            )
            .await?
        {
            Some(Response::Bulk(r)) => Ok(r),
            _ => Ok(wire::BulkResponse::default()),
        }
    }
}
