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
#![allow(missing_docs)]

//! Wire schema. Field numbers and wire types are normative; changing any tag
//! breaks interoperability with existing deployments. The structs are
//! hand-tagged `prost` messages so the protobuf layout stays bit-exact
//! without a protoc build step.
//!
//! `Hello` is exchanged once per session; every later frame is a `Packet`.
//! `ChannelMessage` is the encrypted storage/transfer form; `Content` is
//! what its `encrypted_content` seals.

use prost::Message;

use crate::core::error::BanError;

/// Session handshake. `version` must equal [`crate::core::constants::VERSION`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Hello {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub peer_id: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Link {
    #[prost(message, optional, tag = "1")]
    pub tbs: Option<link::Tbs>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

pub mod link {
    /// Link fields covered by the signature. `channel_id` is transported
    /// empty and injected locally before sign/verify, binding the link to a
    /// channel without carrying the id on the wire.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Tbs {
        #[prost(bytes = "vec", tag = "1")]
        pub trustee_pub_key: Vec<u8>,
        #[prost(string, tag = "2")]
        pub trustee_display_name: String,
        #[prost(double, tag = "3")]
        pub valid_from: f64,
        #[prost(double, tag = "4")]
        pub valid_to: f64,
        #[prost(bytes = "vec", tag = "5")]
        pub channel_id: Vec<u8>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Invite {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_pub_key: Vec<u8>,
    #[prost(string, tag = "2")]
    pub channel_name: String,
    #[prost(message, repeated, tag = "3")]
    pub chain: Vec<Link>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EncryptedInvite {
    #[prost(bytes = "vec", tag = "1")]
    pub request_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub box_data: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InviteRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub peer_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub trustee_pub_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub box_pub_key: Vec<u8>,
}

/// Encrypted channel message: the storage form, the bulk-transfer form and
/// the hashing preimage (content addresses are BLAKE2b over this encoding).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelMessage {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub parents: Vec<Vec<u8>>,
    #[prost(int64, tag = "3")]
    pub height: i64,
    #[prost(bytes = "vec", tag = "4")]
    pub nonce: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub encrypted_content: Vec<u8>,
}

/// Decrypted message content sealed inside `ChannelMessage.encrypted_content`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Content {
    #[prost(message, optional, tag = "1")]
    pub tbs: Option<content::Tbs>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

pub mod content {
    /// Message fields covered by the signature.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Tbs {
        #[prost(bytes = "vec", repeated, tag = "1")]
        pub parents: Vec<Vec<u8>>,
        #[prost(int64, tag = "2")]
        pub height: i64,
        #[prost(message, repeated, tag = "3")]
        pub chain: Vec<super::Link>,
        #[prost(double, tag = "4")]
        pub timestamp: f64,
        #[prost(message, optional, tag = "5")]
        pub body: Option<super::Body>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Body {
    #[prost(oneof = "body::Value", tags = "1, 2")]
    pub value: Option<body::Value>,
}

pub mod body {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(message, tag = "1")]
        Root(super::Root),
        #[prost(string, tag = "2")]
        Json(String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Root {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Query {
    #[prost(oneof = "query::Cursor", tags = "1, 2")]
    pub cursor: Option<query::Cursor>,
    #[prost(bool, tag = "3")]
    pub is_backward: bool,
    #[prost(uint32, tag = "4")]
    pub limit: u32,
}

pub mod query {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Cursor {
        #[prost(int64, tag = "1")]
        Height(i64),
        #[prost(bytes, tag = "2")]
        Hash(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Abbreviated {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub parents: Vec<Vec<u8>>,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryResponse {
    #[prost(message, repeated, tag = "1")]
    pub abbreviated_messages: Vec<Abbreviated>,
    /// Hash just past the returned slice; empty when the slice hits the end.
    #[prost(bytes = "vec", tag = "2")]
    pub forward_hash: Vec<u8>,
    /// First returned hash when the slice does not start at offset 0.
    #[prost(bytes = "vec", tag = "3")]
    pub backward_hash: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Bulk {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub hashes: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BulkResponse {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<ChannelMessage>,
    #[prost(uint32, tag = "2")]
    pub forward_index: u32,
}

/// Sealed sync request. `box_data` seals a [`sync_request::Content`] under
/// the channel's symmetric key with `nonce`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub seq: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub nonce: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub box_data: Vec<u8>,
}

pub mod sync_request {
    /// Decrypted request content. The signature is made by the chain's leaf
    /// key; feed channels carry an empty chain and empty signature.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Content {
        #[prost(message, repeated, tag = "1")]
        pub chain: Vec<super::Link>,
        #[prost(double, tag = "2")]
        pub timestamp: f64,
        #[prost(bytes = "vec", tag = "3")]
        pub signature: Vec<u8>,
        #[prost(oneof = "content::Request", tags = "4, 5")]
        pub request: Option<content::Request>,
    }

    pub mod content {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Request {
            #[prost(message, tag = "4")]
            Query(super::super::Query),
            #[prost(message, tag = "5")]
            Bulk(super::super::Bulk),
        }
    }
}

/// Sealed sync response. `box_data` is `nonce || ciphertext` of a
/// [`sync_response::Content`] under the channel's symmetric key.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub seq: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub box_data: Vec<u8>,
}

pub mod sync_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Content {
        #[prost(oneof = "content::Response", tags = "1, 2")]
        pub response: Option<content::Response>,
    }

    pub mod content {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Response {
            #[prost(message, tag = "1")]
            Query(super::super::QueryResponse),
            #[prost(message, tag = "2")]
            Bulk(super::super::BulkResponse),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Notification {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Error {
    #[prost(string, tag = "1")]
    pub reason: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ping {
    #[prost(uint32, tag = "1")]
    pub seq: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pong {
    #[prost(uint32, tag = "1")]
    pub seq: u32,
}

/// Top-level frame content after the handshake.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Packet {
    #[prost(oneof = "packet::Content", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub content: Option<packet::Content>,
}

pub mod packet {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Content {
        #[prost(message, tag = "1")]
        Error(super::Error),
        #[prost(message, tag = "2")]
        Invite(super::EncryptedInvite),
        #[prost(message, tag = "3")]
        SyncRequest(super::SyncRequest),
        #[prost(message, tag = "4")]
        SyncResponse(super::SyncResponse),
        #[prost(message, tag = "5")]
        Notification(super::Notification),
        #[prost(message, tag = "6")]
        Ping(super::Ping),
        #[prost(message, tag = "7")]
        Pong(super::Pong),
    }
}

/// Canonical encoding of any wire message.
pub fn encode<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}

/// Decode a `Packet` frame; malformed bytes from a peer are ban-worthy.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, BanError> {
    Packet::decode(bytes).map_err(|_| BanError::new("invalid packet encoding"))
}

/// Decode a handshake `Hello`.
pub fn decode_hello(bytes: &[u8]) -> Result<Hello, BanError> {
    Hello::decode(bytes).map_err(|_| BanError::new("invalid hello encoding"))
}

/// Link TBS bytes with the channel id injected, the signing preimage.
pub fn link_tbs_bytes(tbs: &link::Tbs, channel_id: &[u8]) -> Vec<u8> {
    let mut bound = tbs.clone();
    bound.channel_id = channel_id.to_vec();
    encode(&bound)
}

/// Sync request content signing preimage: the content with its signature
/// cleared, followed by the channel id.
pub fn sync_request_tbs_bytes(content: &sync_request::Content, channel_id: &[u8]) -> Vec<u8> {
    let mut unsigned = content.clone();
    unsigned.signature = Vec::new();
    let mut out = encode(&unsigned);
    out.extend_from_slice(channel_id);
    out
}
