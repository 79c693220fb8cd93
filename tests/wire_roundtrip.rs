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

use prost::Message as ProstMessage;

use peerlinks::core::wire;

fn roundtrip_packet(packet: wire::Packet) {
    let bytes = wire::encode(&packet);
    let decoded = wire::decode_packet(&bytes).expect("decode");
    assert_eq!(decoded, packet);
}

#[test]
fn hello_roundtrip() {
    let hello = wire::Hello {
        version: 1,
        peer_id: vec![3u8; 32],
    };
    let decoded = wire::decode_hello(&wire::encode(&hello)).expect("decode");
    assert_eq!(decoded, hello);
}

#[test]
fn packet_variants_roundtrip() {
    roundtrip_packet(wire::Packet {
        content: Some(wire::packet::Content::Error(wire::Error {
            reason: "nope".to_string(),
        })),
    });
    roundtrip_packet(wire::Packet {
        content: Some(wire::packet::Content::Invite(wire::EncryptedInvite {
            request_id: vec![1u8; 32],
            box_data: vec![9u8; 48],
        })),
    });
    roundtrip_packet(wire::Packet {
        content: Some(wire::packet::Content::SyncRequest(wire::SyncRequest {
            channel_id: vec![2u8; 32],
            seq: u32::MAX,
            nonce: vec![4u8; 24],
            box_data: vec![5u8; 64],
        })),
    });
    roundtrip_packet(wire::Packet {
        content: Some(wire::packet::Content::SyncResponse(wire::SyncResponse {
            channel_id: vec![2u8; 32],
            seq: 0,
            box_data: vec![5u8; 64],
        })),
    });
    roundtrip_packet(wire::Packet {
        content: Some(wire::packet::Content::Notification(wire::Notification {
            channel_id: vec![6u8; 32],
        })),
    });
    roundtrip_packet(wire::Packet {
        content: Some(wire::packet::Content::Ping(wire::Ping { seq: 42 })),
    });
    roundtrip_packet(wire::Packet {
        content: Some(wire::packet::Content::Pong(wire::Pong { seq: 42 })),
    });
}

#[test]
fn query_cursor_oneof_roundtrip() {
    for cursor in [
        wire::query::Cursor::Height(12),
        wire::query::Cursor::Hash(vec![8u8; 32]),
    ] {
        let query = wire::Query {
            cursor: Some(cursor),
            is_backward: true,
            limit: 1024,
        };
        let decoded = wire::Query::decode(wire::encode(&query).as_slice()).expect("decode");
        assert_eq!(decoded, query);
    }
}

#[test]
fn channel_message_roundtrip() {
    let message = wire::ChannelMessage {
        channel_id: vec![1u8; 32],
        parents: vec![vec![2u8; 32], vec![3u8; 32]],
        height: 7,
        nonce: vec![4u8; 24],
        encrypted_content: vec![5u8; 100],
    };
    let decoded =
        wire::ChannelMessage::decode(wire::encode(&message).as_slice()).expect("decode");
    assert_eq!(decoded, message);
}

#[test]
fn link_tbs_binds_channel_without_transport() {
    let tbs = wire::link::Tbs {
        trustee_pub_key: vec![1u8; 32],
        trustee_display_name: "m".to_string(),
        valid_from: 1.0,
        valid_to: 2.0,
        channel_id: Vec::new(),
    };
    let on_wire = wire::encode(&tbs);
    let bound_a = wire::link_tbs_bytes(&tbs, &[7u8; 32]);
    let bound_b = wire::link_tbs_bytes(&tbs, &[8u8; 32]);
    // The signing preimage depends on the channel, the wire form does not.
    assert_ne!(bound_a, on_wire);
    assert_ne!(bound_a, bound_b);
    let decoded = wire::link::Tbs::decode(on_wire.as_slice()).expect("decode");
    assert!(decoded.channel_id.is_empty());
}

#[test]
fn sync_request_tbs_excludes_signature() {
    let content = wire::sync_request::Content {
        chain: Vec::new(),
        timestamp: 123.5,
        signature: vec![9u8; 64],
        request: Some(wire::sync_request::content::Request::Bulk(wire::Bulk {
            hashes: vec![vec![1u8; 32]],
        })),
    };
    let a = wire::sync_request_tbs_bytes(&content, &[7u8; 32]);
    let mut resigned = content.clone();
    resigned.signature = vec![1u8; 64];
    let b = wire::sync_request_tbs_bytes(&resigned, &[7u8; 32]);
    assert_eq!(a, b);
}

#[test]
fn garbage_is_rejected() {
    assert!(wire::decode_packet(&[0xff, 0xff, 0xff, 0xff]).is_err());
    assert!(wire::decode_hello(&[0x0a]).is_err());
}

#[test]
fn empty_fields_stay_off_the_wire() {
    // Proto3 semantics: default values take no bytes, so an all-default
    // message is empty. The sync layer relies on this for optional hashes.
    let response = wire::QueryResponse::default();
    assert!(wire::encode(&response).is_empty());
}
