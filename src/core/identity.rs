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

//! Long-lived signing identity with per-channel trust chains.

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;
use zeroize::Zeroize;

use crate::core::chain::{check_link_params, Chain, ChainError, Link};
use crate::core::channel::Channel;
use crate::core::constants::{
    max_json_size_for_chain, EXPIRATION_DELTA, ID_LENGTH, SIGNATURE_SIZE,
};
use crate::core::message::MessageBody;
use crate::core::security::crypto::{self, CryptoError};
use crate::core::types::{
    decode_canonical_limited, encode_canonical, now_seconds, ChannelId, CodecError, Hash32, PeerId,
    RequestId,
};
use crate::core::wire;

/// Domain-separation key for invite request ids.
const INVITE_HASH_KEY: &[u8] = b"peerlinks-invite";

/// Size cap for persisted identity blobs.
const MAX_ENTITY_SIZE: usize = 1024 * 1024;

/// Identity errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no chain for channel")]
    NoChain,
    #[error("body too large")]
    BodyTooLarge,
    #[error("invalid invite request")]
    InvalidRequest,
    #[error("chain: {0}")]
    Chain(#[from] ChainError),
    #[error("crypto")]
    Crypto(#[from] CryptoError),
    #[error("codec")]
    Codec,
}

/// A named Ed25519 keypair plus the chains that make it a channel member.
pub struct Identity {
    name: String,
    signing_key: SigningKey,
    public_key: [u8; 32],
    chains: Mutex<BTreeMap<ChannelId, Chain>>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("public_key", &hex::encode(self.public_key))
            .finish()
    }
}

impl Identity {
    /// Generate a fresh identity.
    pub fn new(name: &str) -> Self {
        let signing_key = crypto::generate_signing_key();
        let public_key = signing_key.verifying_key().to_bytes();
        Self {
            name: name.to_string(),
            signing_key,
            public_key,
            chains: Mutex::new(BTreeMap::new()),
        }
    }

    /// Identity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Public signing key.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Sign raw bytes under this identity's key.
    pub fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_SIZE] {
        crypto::sign(&self.signing_key, data)
    }

    /// Issue a delegation link on `channel_id` to `trustee_pub_key`.
    /// `validity` defaults to `[now, now + 99 days)`.
    pub fn issue_link(
        &self,
        channel_id: &ChannelId,
        trustee_pub_key: &[u8; 32],
        display_name: &str,
        validity: Option<(f64, f64)>,
    ) -> Result<Link, IdentityError> {
        let (valid_from, valid_to) = validity.unwrap_or_else(|| {
            let now = now_seconds();
            (now, now + EXPIRATION_DELTA)
        });
        check_link_params(display_name, valid_from, valid_to)?;
        let tbs = wire::link::Tbs {
            trustee_pub_key: trustee_pub_key.to_vec(),
            trustee_display_name: display_name.to_string(),
            valid_from,
            valid_to,
            channel_id: Vec::new(),
        };
        let signature = self.sign(&wire::link_tbs_bytes(&tbs, channel_id.as_bytes()));
        Ok(Link::new(
            *trustee_pub_key,
            display_name.to_string(),
            valid_from,
            valid_to,
            signature,
        ))
    }

    /// Store the chain that makes this identity a member of `channel_id`,
    /// overwriting any previous one.
    pub fn add_chain(&self, channel_id: &ChannelId, chain: Chain) {
        self.chains
            .lock()
            .expect("chains lock")
            .insert(*channel_id, chain);
    }

    /// The stored chain for `channel_id`, if any.
    pub fn get_chain(&self, channel_id: &ChannelId) -> Option<Chain> {
        self.chains.lock().expect("chains lock").get(channel_id).cloned()
    }

    /// Remove the chain for `channel_id`.
    pub fn remove_chain(&self, channel_id: &ChannelId) {
        self.chains.lock().expect("chains lock").remove(channel_id);
    }

    /// Channels this identity holds chains for.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.chains.lock().expect("chains lock").keys().copied().collect()
    }

    /// Build and sign message content for a post on `channel_id`.
    pub fn sign_content(
        &self,
        channel_id: &ChannelId,
        parents: &[Hash32],
        height: i64,
        timestamp: f64,
        body: &MessageBody,
    ) -> Result<wire::Content, IdentityError> {
        let chain = self.get_chain(channel_id).ok_or(IdentityError::NoChain)?;
        let limit = max_json_size_for_chain(chain.len()).ok_or(IdentityError::BodyTooLarge)?;
        if body.json_len() > limit {
            return Err(IdentityError::BodyTooLarge);
        }
        let tbs = wire::content::Tbs {
            parents: parents.iter().map(|p| p.as_bytes().to_vec()).collect(),
            height,
            chain: chain.to_wire(),
            timestamp,
            body: Some(body.to_wire()),
        };
        let signature = self.sign(&wire::encode(&tbs));
        Ok(wire::Content {
            tbs: Some(tbs),
            signature: signature.to_vec(),
        })
    }

    /// Request an invite: advertise our trustee key and a fresh box key.
    /// The returned decryptor holds the only copy of the box secret.
    pub fn request_invite(&self, peer_id: &PeerId) -> (wire::InviteRequest, InviteDecryptor) {
        let (secret, box_pub_key) = crypto::generate_box_keypair();
        let request = wire::InviteRequest {
            peer_id: peer_id.as_bytes().to_vec(),
            trustee_pub_key: self.public_key.to_vec(),
            box_pub_key: box_pub_key.to_vec(),
        };
        (request, InviteDecryptor { secret })
    }

    /// Issue an invite for `request` on `channel`, sealed to the requester's
    /// box key. Returns the encrypted invite and the requester's peer id.
    pub fn issue_invite(
        &self,
        channel: &Channel,
        request: &wire::InviteRequest,
        invitee_name: &str,
    ) -> Result<(wire::EncryptedInvite, PeerId), IdentityError> {
        if request.trustee_pub_key.len() != ID_LENGTH
            || request.box_pub_key.len() != ID_LENGTH
            || request.peer_id.len() != ID_LENGTH
        {
            return Err(IdentityError::InvalidRequest);
        }
        let mut trustee = [0u8; 32];
        trustee.copy_from_slice(&request.trustee_pub_key);
        let mut box_pub = [0u8; 32];
        box_pub.copy_from_slice(&request.box_pub_key);

        let chain = self.get_chain(channel.id()).ok_or(IdentityError::NoChain)?;
        let link = self.issue_link(channel.id(), &trustee, invitee_name, None)?;
        let full_chain = chain.append(link)?;

        let invite = wire::Invite {
            channel_pub_key: channel.public_key().to_vec(),
            channel_name: channel.name().to_string(),
            chain: full_chain.to_wire(),
        };
        let box_data = crypto::seal_box(&box_pub, &wire::encode(&invite))?;
        let request_id = request_id_for(&trustee)?;
        let peer_id = Hash32::from_slice(&request.peer_id).ok_or(IdentityError::InvalidRequest)?;
        Ok((
            wire::EncryptedInvite {
                request_id: request_id.as_bytes().to_vec(),
                box_data,
            },
            peer_id,
        ))
    }

    /// Serialize for the entity store.
    pub fn to_entity(&self) -> Result<Vec<u8>, CodecError> {
        let chains = self
            .chains
            .lock()
            .expect("chains lock")
            .iter()
            .map(|(id, chain)| (id.to_hex(), chain.clone()))
            .collect();
        let record = PersistedIdentity {
            name: self.name.clone(),
            secret_key: self.signing_key.to_keypair_bytes().to_vec(),
            chains,
        };
        encode_canonical(&record)
    }

    /// Rebuild from an entity blob.
    pub fn from_entity(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut record: PersistedIdentity = decode_canonical_limited(bytes, MAX_ENTITY_SIZE)?;
        let keypair: [u8; 64] = record
            .secret_key
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::Deserialize)?;
        let signing_key =
            SigningKey::from_keypair_bytes(&keypair).map_err(|_| CodecError::Deserialize)?;
        record.secret_key.zeroize();
        let public_key = signing_key.verifying_key().to_bytes();
        let chains = record
            .chains
            .iter()
            .filter_map(|(hex_id, chain)| Some((Hash32::from_hex(hex_id)?, chain.clone())))
            .collect();
        Ok(Self {
            name: record.name,
            signing_key,
            public_key,
            chains: Mutex::new(chains),
        })
    }
}

/// Derive the invite request id for a trustee key.
pub fn request_id_for(trustee_pub_key: &[u8; 32]) -> Result<RequestId, IdentityError> {
    Ok(Hash32::from_bytes(crypto::keyed_hash32(
        INVITE_HASH_KEY,
        trustee_pub_key,
    )?))
}

/// One-shot opener for the encrypted invite matching a request.
/// The box secret never leaves this value and is wiped on drop.
pub struct InviteDecryptor {
    secret: crypto_box::SecretKey,
}

impl InviteDecryptor {
    /// Open the sealed invite.
    pub fn decrypt(&self, encrypted: &wire::EncryptedInvite) -> Result<wire::Invite, IdentityError> {
        let plaintext = crypto::open_box(&self.secret, &encrypted.box_data)?;
        <wire::Invite as prost::Message>::decode(plaintext.as_slice())
            .map_err(|_| IdentityError::Codec)
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedIdentity {
    name: String,
    secret_key: Vec<u8>,
    chains: Vec<(String, Chain)>,
}
