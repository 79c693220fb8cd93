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

//! Encrypted channel messages.
//!
//! The encrypted record (channel id, parents, height, nonce, box) is the
//! storage form, the bulk-transfer form, and the hashing preimage: content
//! addresses are BLAKE2b-256 over its canonical encoding. The sealed content
//! carries the chain, timestamp, body and signature.

use thiserror::Error;

use crate::core::chain::Chain;
use crate::core::constants::{NONCE_SIZE, SIGNATURE_SIZE};
use crate::core::error::BanError;
use crate::core::security::crypto::{self, CryptoError, SymmetricKey};
use crate::core::types::{ChannelId, Hash32};
use crate::core::wire;

/// Message errors. Ban-worthy variants are attributable to the remote.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error(transparent)]
    Ban(#[from] BanError),
    #[error("codec")]
    Codec,
    #[error("crypto")]
    Crypto(CryptoError),
}

impl MessageError {
    /// Ban reason, if this error should terminate the peer session.
    pub fn ban_reason(&self) -> Option<&str> {
        match self {
            MessageError::Ban(b) => Some(&b.reason),
            _ => None,
        }
    }
}

/// Decrypted message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    /// The unique channel root.
    Root,
    /// An opaque JSON string; the core only checks that it parses.
    Json(String),
}

impl MessageBody {
    /// Build a JSON body from a serializable value.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, MessageError> {
        serde_json::to_string(value)
            .map(MessageBody::Json)
            .map_err(|_| MessageError::Codec)
    }

    /// Whether this is the root body.
    pub fn is_root(&self) -> bool {
        matches!(self, MessageBody::Root)
    }

    /// JSON payload length in bytes (0 for root).
    pub fn json_len(&self) -> usize {
        match self {
            MessageBody::Root => 0,
            MessageBody::Json(s) => s.len(),
        }
    }

    /// Wire form.
    pub fn to_wire(&self) -> wire::Body {
        let value = match self {
            MessageBody::Root => wire::body::Value::Root(wire::Root {}),
            MessageBody::Json(s) => wire::body::Value::Json(s.clone()),
        };
        wire::Body { value: Some(value) }
    }

    fn from_wire(body: &wire::Body) -> Result<Self, MessageError> {
        match &body.value {
            Some(wire::body::Value::Root(_)) => Ok(MessageBody::Root),
            Some(wire::body::Value::Json(s)) => {
                // The core validates only that the string parses as JSON.
                if serde_json::from_str::<serde_json::Value>(s).is_err() {
                    return Err(BanError::new("invalid JSON").into());
                }
                Ok(MessageBody::Json(s.clone()))
            }
            None => Err(BanError::new("missing body").into()),
        }
    }
}

/// Decrypted view of a message's sealed content.
#[derive(Clone, Debug)]
pub struct MessageContent {
    /// Signing chain from the channel root key to the author's leaf key.
    pub chain: Chain,
    /// Author timestamp, seconds since epoch.
    pub timestamp: f64,
    /// Message body.
    pub body: MessageBody,
    /// Ed25519 signature over the TBS by the chain's leaf key.
    pub signature: [u8; SIGNATURE_SIZE],
}

/// An encrypted, content-addressed channel message.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    channel_id: ChannelId,
    parents: Vec<Hash32>,
    height: i64,
    nonce: [u8; NONCE_SIZE],
    encrypted_content: Vec<u8>,
    hash: Hash32,
}

impl Message {
    /// Seal `content` under the channel key, producing the encrypted record.
    pub fn seal(
        key: &SymmetricKey,
        channel_id: &ChannelId,
        parents: Vec<Hash32>,
        height: i64,
        content: &wire::Content,
        nonce: Option<[u8; NONCE_SIZE]>,
    ) -> Result<Message, MessageError> {
        let nonce = nonce.unwrap_or_else(crypto::random_bytes);
        let plaintext = wire::encode(content);
        let encrypted_content =
            crypto::secretbox_seal(key, &nonce, &plaintext).map_err(MessageError::Crypto)?;
        let mut message = Message {
            channel_id: *channel_id,
            parents,
            height,
            nonce,
            encrypted_content,
            hash: Hash32::default(),
        };
        message.hash = Hash32::from_bytes(crypto::hash32(&wire::encode(&message.to_wire())));
        Ok(message)
    }

    /// Content address of the encrypted record.
    pub fn hash(&self) -> &Hash32 {
        &self.hash
    }

    /// Channel this message belongs to.
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Parent hashes (empty only for the root).
    pub fn parents(&self) -> &[Hash32] {
        &self.parents
    }

    /// DAG height: one more than the highest parent.
    pub fn height(&self) -> i64 {
        self.height
    }

    /// Whether this is shaped like a channel root.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Open the sealed content and shape-check it against the envelope.
    pub fn decrypt(&self, key: &SymmetricKey) -> Result<MessageContent, MessageError> {
        let plaintext = crypto::secretbox_open(key, &self.nonce, &self.encrypted_content)
            .map_err(|_| BanError::new("decryption failed"))?;
        let content = <wire::Content as prost::Message>::decode(plaintext.as_slice())
            .map_err(|_| BanError::new("invalid content encoding"))?;
        let tbs = content
            .tbs
            .as_ref()
            .ok_or_else(|| BanError::new("missing content tbs"))?;

        // The signed parents/height must match what the envelope claims,
        // otherwise the signature covers different causal coordinates.
        let tbs_parents: Option<Vec<Hash32>> = tbs
            .parents
            .iter()
            .map(|p| Hash32::from_slice(p))
            .collect();
        let tbs_parents = tbs_parents.ok_or_else(|| BanError::new("invalid hash length"))?;
        if tbs_parents != self.parents || tbs.height != self.height {
            return Err(BanError::new("tbs does not match envelope").into());
        }

        let chain = Chain::from_wire(&tbs.chain)
            .map_err(|_| BanError::new("invalid signature or chain"))?;
        let body = tbs
            .body
            .as_ref()
            .ok_or_else(|| BanError::new("missing body"))?;
        let body = MessageBody::from_wire(body)?;
        let signature: [u8; SIGNATURE_SIZE] = content
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| BanError::new("invalid signature length"))?;
        Ok(MessageContent {
            chain,
            timestamp: tbs.timestamp,
            body,
            signature,
        })
    }

    /// Verify already-decrypted content: walk the chain to the leaf key and
    /// check the signature over the TBS.
    pub fn verify_content(
        &self,
        content: &MessageContent,
        channel_pub_key: &[u8; 32],
        channel_id: &ChannelId,
    ) -> bool {
        let Ok(leaf_key) = content
            .chain
            .verify(channel_pub_key, channel_id, content.timestamp)
        else {
            return false;
        };
        let tbs = self.tbs_for(content);
        crypto::verify(&leaf_key, &wire::encode(&tbs), &content.signature)
    }

    /// Decrypt and verify in one step; the acceptance precondition.
    pub fn verify(
        &self,
        key: &SymmetricKey,
        channel_pub_key: &[u8; 32],
        channel_id: &ChannelId,
    ) -> Result<bool, MessageError> {
        let content = self.decrypt(key)?;
        Ok(self.verify_content(&content, channel_pub_key, channel_id))
    }

    /// The signing preimage for this envelope and `content`.
    pub fn tbs_for(&self, content: &MessageContent) -> wire::content::Tbs {
        wire::content::Tbs {
            parents: self.parents.iter().map(|p| p.as_bytes().to_vec()).collect(),
            height: self.height,
            chain: content.chain.to_wire(),
            timestamp: content.timestamp,
            body: Some(content.body.to_wire()),
        }
    }

    /// Wire/storage form.
    pub fn to_wire(&self) -> wire::ChannelMessage {
        wire::ChannelMessage {
            channel_id: self.channel_id.as_bytes().to_vec(),
            parents: self.parents.iter().map(|p| p.as_bytes().to_vec()).collect(),
            height: self.height,
            nonce: self.nonce.to_vec(),
            encrypted_content: self.encrypted_content.clone(),
        }
    }

    /// Parse and shape-check a wire message; recomputes the content address.
    pub fn from_wire(wm: &wire::ChannelMessage) -> Result<Message, MessageError> {
        let channel_id = Hash32::from_slice(&wm.channel_id)
            .ok_or_else(|| BanError::new("invalid channel id length"))?;
        let parents: Option<Vec<Hash32>> =
            wm.parents.iter().map(|p| Hash32::from_slice(p)).collect();
        let parents = parents.ok_or_else(|| BanError::new("invalid hash length"))?;
        if wm.nonce.len() != NONCE_SIZE {
            return Err(BanError::new("invalid nonce length").into());
        }
        if wm.height < 0 {
            return Err(BanError::new("negative height").into());
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&wm.nonce);
        let hash = Hash32::from_bytes(crypto::hash32(&wire::encode(wm)));
        Ok(Message {
            channel_id,
            parents,
            height: wm.height,
            nonce,
            encrypted_content: wm.encrypted_content.clone(),
            hash,
        })
    }
}
