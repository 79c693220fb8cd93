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

//! Node configuration (TOML).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config")]
    Read,
    #[error("parse config")]
    Parse,
}

/// Node configuration root.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node settings.
    pub node: NodeSettings,
    /// P2P settings.
    pub p2p: P2pConfig,
    /// Sync settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Node settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Human-readable name.
    pub name: String,
    /// Data directory (db + keys).
    pub data_dir: String,
}

/// P2P settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct P2pConfig {
    /// TCP listen address, e.g. `0.0.0.0:4401`.
    pub listen_addr: String,
}

/// Sync settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Per-request timeout in seconds before a sync request resolves empty.
    #[serde(default = "default_sync_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_sync_timeout_secs() -> u64 {
    crate::core::constants::DEFAULT_SYNC_TIMEOUT.as_secs()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_sync_timeout_secs(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                name: "peerlinks".to_string(),
                data_dir: "./data".to_string(),
            },
            p2p: P2pConfig {
                listen_addr: "0.0.0.0:4401".to_string(),
            },
            sync: SyncConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parse a TOML config string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|_| ConfigError::Parse)
    }

    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|_| ConfigError::Read)?;
        Self::parse(&s)
    }
}
