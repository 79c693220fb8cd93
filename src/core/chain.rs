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

//! Signed delegation links and verification chains.
//!
//! A link binds a trustee key to a channel for a bounded validity window.
//! A chain of up to [`MAX_CHAIN_LENGTH`] links walks from the channel's root
//! key to the leaf key that is authorized to sign messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::constants::{
    EXPIRATION_DELTA, ID_LENGTH, MAX_CHAIN_LENGTH, MAX_DISPLAY_NAME_LENGTH, SIGNATURE_SIZE,
};
use crate::core::security::crypto;
use crate::core::types::ChannelId;
use crate::core::wire;

/// Chain errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain too long")]
    TooLong,
    #[error("invalid chain")]
    InvalidChain,
    #[error("malformed link")]
    MalformedLink,
    #[error("display name too long")]
    NameTooLong,
    #[error("invalid validity window")]
    InvalidWindow,
}

/// Validate link issue parameters before signing.
pub fn check_link_params(
    display_name: &str,
    valid_from: f64,
    valid_to: f64,
) -> Result<(), ChainError> {
    if display_name.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ChainError::NameTooLong);
    }
    if !(valid_to > valid_from) || valid_to - valid_from > EXPIRATION_DELTA {
        return Err(ChainError::InvalidWindow);
    }
    Ok(())
}

/// A signed, time-bounded delegation of signing rights to a trustee key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    trustee_pub_key: [u8; 32],
    trustee_display_name: String,
    valid_from: f64,
    valid_to: f64,
    signature: Vec<u8>,
}

impl Link {
    /// Assemble a link from already-signed parts.
    pub fn new(
        trustee_pub_key: [u8; 32],
        trustee_display_name: String,
        valid_from: f64,
        valid_to: f64,
        signature: [u8; SIGNATURE_SIZE],
    ) -> Self {
        Self {
            trustee_pub_key,
            trustee_display_name,
            valid_from,
            valid_to,
            signature: signature.to_vec(),
        }
    }

    /// Trustee public key (the next signer in a chain walk).
    pub fn trustee_pub_key(&self) -> &[u8; 32] {
        &self.trustee_pub_key
    }

    /// Display name recorded for the trustee.
    pub fn trustee_display_name(&self) -> &str {
        &self.trustee_display_name
    }

    /// Start of the validity window, seconds since epoch.
    pub fn valid_from(&self) -> f64 {
        self.valid_from
    }

    /// End of the validity window, seconds since epoch.
    pub fn valid_to(&self) -> f64 {
        self.valid_to
    }

    /// Signing preimage with the channel id injected.
    pub fn tbs_bytes(&self, channel_id: &ChannelId) -> Vec<u8> {
        wire::link_tbs_bytes(&self.wire_tbs(), channel_id.as_bytes())
    }

    /// Verify this link against the current signer at `timestamp`.
    pub fn verify(&self, signer: &[u8; 32], channel_id: &ChannelId, timestamp: f64) -> bool {
        if timestamp < self.valid_from || timestamp >= self.valid_to {
            return false;
        }
        crypto::verify(signer, &self.tbs_bytes(channel_id), &self.signature)
    }

    fn wire_tbs(&self) -> wire::link::Tbs {
        wire::link::Tbs {
            trustee_pub_key: self.trustee_pub_key.to_vec(),
            trustee_display_name: self.trustee_display_name.clone(),
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            // Transported empty; injected before sign/verify.
            channel_id: Vec::new(),
        }
    }

    /// Wire form. The channel id field stays empty.
    pub fn to_wire(&self) -> wire::Link {
        wire::Link {
            tbs: Some(self.wire_tbs()),
            signature: self.signature.clone(),
        }
    }

    /// Parse and shape-check a wire link.
    pub fn from_wire(link: &wire::Link) -> Result<Self, ChainError> {
        let tbs = link.tbs.as_ref().ok_or(ChainError::MalformedLink)?;
        if tbs.trustee_pub_key.len() != ID_LENGTH
            || link.signature.len() != SIGNATURE_SIZE
            || tbs.trustee_display_name.len() > MAX_DISPLAY_NAME_LENGTH
        {
            return Err(ChainError::MalformedLink);
        }
        let mut pk = [0u8; 32];
        pk.copy_from_slice(&tbs.trustee_pub_key);
        Ok(Self {
            trustee_pub_key: pk,
            trustee_display_name: tbs.trustee_display_name.clone(),
            valid_from: tbs.valid_from,
            valid_to: tbs.valid_to,
            signature: link.signature.clone(),
        })
    }
}

/// Ordered sequence of links from a channel root key to a leaf key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    links: Vec<Link>,
}

impl Chain {
    /// Build a chain; at most [`MAX_CHAIN_LENGTH`] links.
    pub fn new(links: Vec<Link>) -> Result<Self, ChainError> {
        if links.len() > MAX_CHAIN_LENGTH {
            return Err(ChainError::TooLong);
        }
        Ok(Self { links })
    }

    /// The empty chain: the channel root key signs directly.
    pub fn empty() -> Self {
        Self { links: Vec::new() }
    }

    /// Links in delegation order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Chain extended by one more link.
    pub fn append(&self, link: Link) -> Result<Chain, ChainError> {
        let mut links = self.links.clone();
        links.push(link);
        Chain::new(links)
    }

    /// Walk the chain at `timestamp`, returning the authorized leaf key.
    pub fn verify(
        &self,
        channel_pub_key: &[u8; 32],
        channel_id: &ChannelId,
        timestamp: f64,
    ) -> Result<[u8; 32], ChainError> {
        if self.links.len() > MAX_CHAIN_LENGTH {
            return Err(ChainError::TooLong);
        }
        let mut signer = *channel_pub_key;
        for link in &self.links {
            if !link.verify(&signer, channel_id, timestamp) {
                return Err(ChainError::InvalidChain);
            }
            signer = *link.trustee_pub_key();
        }
        Ok(signer)
    }

    /// Leaf key without verification (terminal trustee, or the root key).
    pub fn leaf_key(&self, channel_pub_key: &[u8; 32]) -> [u8; 32] {
        self.links
            .last()
            .map(|l| *l.trustee_pub_key())
            .unwrap_or(*channel_pub_key)
    }

    /// Preference order when an identity holds several chains for a channel:
    /// shorter wins, ties break on the last trustee key bytes.
    pub fn is_better_than(&self, other: &Chain) -> bool {
        if self.links.len() != other.links.len() {
            return self.links.len() < other.links.len();
        }
        match (self.links.last(), other.links.last()) {
            (Some(a), Some(b)) => a.trustee_pub_key() < b.trustee_pub_key(),
            _ => false,
        }
    }

    /// Wire form.
    pub fn to_wire(&self) -> Vec<wire::Link> {
        self.links.iter().map(Link::to_wire).collect()
    }

    /// Parse and shape-check a wire chain.
    pub fn from_wire(links: &[wire::Link]) -> Result<Self, ChainError> {
        if links.len() > MAX_CHAIN_LENGTH {
            return Err(ChainError::TooLong);
        }
        let links = links
            .iter()
            .map(Link::from_wire)
            .collect::<Result<Vec<_>, _>>()?;
        Chain::new(links)
    }
}
