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

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container. Exposition is the embedder's concern; the registry
/// is public and can be gathered from any HTTP layer.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Connected peers gauge.
    pub peers: IntGauge,
    /// Messages accepted into channels.
    pub messages_received_total: IntCounter,
    /// Messages posted locally.
    pub messages_posted_total: IntCounter,
    /// Peer sessions terminated for protocol violations.
    pub bans_total: IntCounter,
    /// Sync loop runs.
    pub sync_runs_total: IntCounter,
    /// Packets that failed to decode or dispatch.
    pub invalid_packets_total: IntCounter,
    /// Invites resolved for waiting requesters.
    pub invites_relayed_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let peers =
            IntGauge::new("peerlinks_peers", "Connected peers").map_err(|_| MetricsError::Prom)?;
        let messages_received_total = IntCounter::new(
            "peerlinks_messages_received_total",
            "Messages accepted into channels",
        )
        .map_err(|_| MetricsError::Prom)?;
        let messages_posted_total = IntCounter::new(
            "peerlinks_messages_posted_total",
            "Messages posted locally",
        )
        .map_err(|_| MetricsError::Prom)?;
        let bans_total = IntCounter::new(
            "peerlinks_bans_total",
            "Peer sessions terminated for protocol violations",
        )
        .map_err(|_| MetricsError::Prom)?;
        let sync_runs_total = IntCounter::new("peerlinks_sync_runs_total", "Sync loop runs")
            .map_err(|_| MetricsError::Prom)?;
        let invalid_packets_total = IntCounter::new(
            "peerlinks_invalid_packets_total",
            "Packets that failed to decode or dispatch",
        )
        .map_err(|_| MetricsError::Prom)?;
        let invites_relayed_total = IntCounter::new(
            "peerlinks_invites_relayed_total",
            "Invites resolved for waiting requesters",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(peers.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(messages_received_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(messages_posted_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(bans_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(sync_runs_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(invalid_packets_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(invites_relayed_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            peers,
            messages_received_total,
            messages_posted_total,
            bans_total,
            sync_runs_total,
            invalid_packets_total,
            invites_relayed_total,
        })
    }
}
