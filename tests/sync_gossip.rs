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

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use peerlinks::core::identity::request_id_for;
use peerlinks::core::message::MessageBody;
use peerlinks::core::wire;
use peerlinks::networking::socket::frame_socket;
use peerlinks::protocol::Protocol;
use peerlinks::storage::{MemoryStorage, Storage};

const WAIT: Duration = Duration::from_secs(10);

fn new_protocol() -> Arc<Protocol> {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    Arc::new(Protocol::with_timeout(storage, Duration::from_secs(2)).expect("protocol"))
}

fn link(a: &Arc<Protocol>, b: &Arc<Protocol>) {
    let (socket_a, socket_b) = tokio::io::duplex(1 << 20);
    let (pa, pb) = (a.clone(), b.clone());
    tokio::spawn(async move {
        let _ = pa.connect(socket_a).await;
    });
    tokio::spawn(async move {
        let _ = pb.connect(socket_b).await;
    });
}

#[tokio::test]
async fn invite_gossip_and_concurrent_posts_converge() {
    let a = new_protocol();
    let b = new_protocol();

    let (a_identity, a_channel) = a.create_identity("a").await.expect("identity a");
    let (b_identity, _b_own) = b.create_identity("b").await.expect("identity b");

    // A posts before B even knows the channel exists.
    let posted = a_channel
        .post(
            MessageBody::Json(r#"{"text":"ohai"}"#.to_string()),
            &a_identity,
        )
        .await
        .expect("post");

    link(&a, &b);

    // Invite flow: the request travels out of band, the sealed invite in
    // band through the peer session.
    let (request, decryptor) = b_identity.request_invite(b.peer_id());
    let request_id = request_id_for(b_identity.public_key()).expect("request id");
    let invite_waiter = b.wait_for_invite(&request_id);

    let (encrypted, b_peer) = a_identity
        .issue_invite(&a_channel, &request, "b")
        .expect("issue invite");
    assert_eq!(&b_peer, b.peer_id());
    timeout(WAIT, a.wait_for_peer(&b_peer))
        .await
        .expect("peer wait timeout")
        .expect("peer");
    a.send_invite(&b_peer, encrypted).await.expect("send invite");

    let sealed = timeout(WAIT, invite_waiter.wait())
        .await
        .expect("invite timeout")
        .expect("invite");
    let invite = decryptor.decrypt(&sealed).expect("open invite");
    let b_channel = b
        .channel_from_invite(&invite, &b_identity)
        .await
        .expect("join");

    // Both ends agree on the channel id; B's chain has length 1 and ends
    // at B's key.
    assert_eq!(a_channel.id(), b_channel.id());
    let chain = b_identity.get_chain(b_channel.id()).expect("chain");
    assert_eq!(chain.len(), 1);
    assert_eq!(&chain.leaf_key(b_channel.public_key()), b_identity.public_key());

    // Gossip: B pulls the root and the pre-existing post.
    timeout(WAIT, b_channel.await_message(posted.hash()))
        .await
        .expect("sync timeout")
        .expect("sync");
    assert_eq!(b_channel.message_count().await.expect("count"), 2);
    let m = b_channel
        .message_at_offset(1)
        .await
        .expect("offset")
        .expect("present");
    let content = b_channel.open(&m).expect("open");
    assert_eq!(
        content.body,
        MessageBody::Json(r#"{"text":"ohai"}"#.to_string())
    );

    // Concurrent posts from both ends become siblings and converge.
    let from_a = a_channel
        .post(MessageBody::Json(r#"{"from":"a"}"#.to_string()), &a_identity)
        .await
        .expect("post a");
    let from_b = b_channel
        .post(MessageBody::Json(r#"{"from":"b"}"#.to_string()), &b_identity)
        .await
        .expect("post b");

    timeout(WAIT, a_channel.await_message(from_b.hash()))
        .await
        .expect("a sync timeout")
        .expect("a sync");
    timeout(WAIT, b_channel.await_message(from_a.hash()))
        .await
        .expect("b sync timeout")
        .expect("b sync");

    let count = a_channel.message_count().await.expect("count");
    assert_eq!(count, 4);
    assert_eq!(b_channel.message_count().await.expect("count"), 4);
    for offset in 0..count {
        let ma = a_channel
            .message_at_offset(offset)
            .await
            .expect("offset")
            .expect("present");
        let mb = b_channel
            .message_at_offset(offset)
            .await
            .expect("offset")
            .expect("present");
        assert_eq!(ma.hash(), mb.hash(), "divergence at offset {offset}");
    }
}

#[tokio::test]
async fn malformed_sync_request_gets_banned() {
    let a = new_protocol();
    let (_a_identity, a_channel) = a.create_identity("a").await.expect("identity");

    let (client_io, server_io) = tokio::io::duplex(1 << 16);
    {
        let a = a.clone();
        tokio::spawn(async move {
            let _ = a.connect(server_io).await;
        });
    }
    let (mut reader, mut writer) = frame_socket(client_io);

    let hello = wire::Hello {
        version: 1,
        peer_id: vec![9u8; 32],
    };
    writer
        .send_frame(&wire::encode(&hello))
        .await
        .expect("send hello");
    let frame = timeout(WAIT, reader.next_frame())
        .await
        .expect("hello timeout")
        .expect("read")
        .expect("open");
    let remote = wire::decode_hello(&frame).expect("hello");
    assert_eq!(remote.version, 1);

    // A sync request whose box cannot possibly authenticate.
    let packet = wire::Packet {
        content: Some(wire::packet::Content::SyncRequest(wire::SyncRequest {
            channel_id: a_channel.id().as_bytes().to_vec(),
            seq: 7,
            nonce: vec![0u8; 24],
            box_data: vec![1, 2, 3, 4],
        })),
    };
    writer
        .send_frame(&wire::encode(&packet))
        .await
        .expect("send");

    // The session must answer with an error packet; queries and pings may
    // arrive first.
    let reason = loop {
        let frame = timeout(WAIT, reader.next_frame())
            .await
            .expect("frame timeout")
            .expect("read");
        let Some(frame) = frame else {
            panic!("socket closed before the error packet");
        };
        let packet = wire::decode_packet(&frame).expect("packet");
        if let Some(wire::packet::Content::Error(e)) = packet.content {
            break e.reason;
        }
    };
    assert_eq!(reason, "decryption failed");
    // The ban left the channel untouched.
    assert_eq!(a_channel.message_count().await.expect("count"), 1);
}

#[tokio::test]
async fn wrong_hello_version_is_rejected() {
    let a = new_protocol();
    a.create_identity("a").await.expect("identity");

    let (client_io, server_io) = tokio::io::duplex(1 << 16);
    {
        let a = a.clone();
        tokio::spawn(async move {
            let _ = a.connect(server_io).await;
        });
    }
    let (mut reader, mut writer) = frame_socket(client_io);

    let bad_hello = wire::Hello {
        version: 2,
        peer_id: vec![9u8; 32],
    };
    writer
        .send_frame(&wire::encode(&bad_hello))
        .await
        .expect("send hello");

    // First frame is the remote hello, then the rejection.
    let mut saw_error = false;
    loop {
        let frame = timeout(WAIT, reader.next_frame())
            .await
            .expect("frame timeout")
            .expect("read");
        let Some(frame) = frame else { break };
        if let Ok(packet) = wire::decode_packet(&frame) {
            if let Some(wire::packet::Content::Error(e)) = packet.content {
                assert_eq!(e.reason, "unsupported version");
                saw_error = true;
            }
        }
    }
    assert!(saw_error, "expected an error packet before close");
}
