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
use tokio::sync::broadcast;

use peerlinks::core::channel::{Channel, ChannelError};
use peerlinks::core::identity::{Identity, IdentityError};
use peerlinks::core::message::{Message, MessageBody};
use peerlinks::core::types::{now_seconds, Hash32};
use peerlinks::monitoring::metrics::Metrics;
use peerlinks::storage::{MemoryStorage, Storage};

fn env() -> (Arc<dyn Storage>, Arc<Metrics>, broadcast::Sender<Hash32>) {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let (updates, _) = broadcast::channel(64);
    (storage, metrics, updates)
}

async fn new_channel(name: &str) -> (Identity, Channel) {
    let (storage, metrics, updates) = env();
    let identity = Identity::new(name);
    let channel = Channel::create(&identity, name, storage, metrics, updates)
        .await
        .expect("create channel");
    (identity, channel)
}

/// Sign and seal a message with explicit coordinates, bypassing `post`.
fn craft(
    channel: &Channel,
    identity: &Identity,
    parents: Vec<Hash32>,
    height: i64,
    timestamp: f64,
    body: MessageBody,
) -> Message {
    let content = identity
        .sign_content(channel.id(), &parents, height, timestamp, &body)
        .expect("sign");
    channel.seal(parents, height, &content).expect("seal")
}

fn ban_reason(err: &ChannelError) -> &str {
    err.ban_reason().expect("expected a ban")
}

#[tokio::test]
async fn create_posts_unique_root() {
    let (_identity, channel) = new_channel("a").await;
    assert_eq!(channel.message_count().await.expect("count"), 1);

    let root = channel
        .message_at_offset(0)
        .await
        .expect("offset")
        .expect("root present");
    assert!(root.is_root());
    assert_eq!(root.height(), 0);
    let content = channel.open(&root).expect("open");
    assert!(content.body.is_root());
    assert!(content.chain.is_empty());
}

#[tokio::test]
async fn second_root_is_rejected() {
    let (identity, channel) = new_channel("a").await;
    let dup = craft(
        &channel,
        &identity,
        Vec::new(),
        0,
        now_seconds(),
        MessageBody::Root,
    );
    let err = channel.receive(dup).await.unwrap_err();
    assert_eq!(ban_reason(&err), "duplicate root");
    assert_eq!(channel.message_count().await.expect("count"), 1);
}

#[tokio::test]
async fn post_then_receive_is_idempotent() {
    let (identity, channel) = new_channel("a").await;
    let body = MessageBody::Json(r#"{"text":"ohai"}"#.to_string());
    let posted = channel.post(body, &identity).await.expect("post");
    assert_eq!(channel.message_count().await.expect("count"), 2);
    assert_eq!(posted.height(), 1);

    // Receiving our own message again is a duplicate no-op.
    assert!(!channel.receive(posted.clone()).await.expect("receive"));
    assert_eq!(channel.message_count().await.expect("count"), 2);

    let stored = channel
        .message_at_offset(1)
        .await
        .expect("offset")
        .expect("present");
    let content = channel.open(&stored).expect("open");
    assert_eq!(
        content.body,
        MessageBody::Json(r#"{"text":"ohai"}"#.to_string())
    );
}

#[tokio::test]
async fn posting_a_root_body_is_refused() {
    let (identity, channel) = new_channel("a").await;
    let err = channel.post(MessageBody::Root, &identity).await.unwrap_err();
    assert!(matches!(err, ChannelError::RootForbidden));
}

#[tokio::test]
async fn wrong_height_is_banned() {
    let (identity, channel) = new_channel("a").await;
    let root_hash = *channel
        .message_at_offset(0)
        .await
        .expect("offset")
        .expect("root")
        .hash();
    let bad = craft(
        &channel,
        &identity,
        vec![root_hash],
        2,
        now_seconds(),
        MessageBody::Json("{}".to_string()),
    );
    let err = channel.receive(bad).await.unwrap_err();
    assert_eq!(ban_reason(&err), "invalid height");
}

#[tokio::test]
async fn unknown_parent_is_banned() {
    let (identity, channel) = new_channel("a").await;
    let ghost = Hash32::from_bytes([42u8; 32]);
    let bad = craft(
        &channel,
        &identity,
        vec![ghost],
        1,
        now_seconds(),
        MessageBody::Json("{}".to_string()),
    );
    let err = channel.receive(bad).await.unwrap_err();
    assert!(ban_reason(&err).starts_with("parent not found: "));
}

#[tokio::test]
async fn future_timestamp_is_banned() {
    let (identity, channel) = new_channel("a").await;
    let root_hash = *channel
        .message_at_offset(0)
        .await
        .expect("offset")
        .expect("root")
        .hash();
    let bad = craft(
        &channel,
        &identity,
        vec![root_hash],
        1,
        now_seconds() + 600.0,
        MessageBody::Json("{}".to_string()),
    );
    let err = channel.receive(bad).await.unwrap_err();
    assert_eq!(ban_reason(&err), "timestamp in the future");
}

#[tokio::test]
async fn timestamp_below_parents_is_banned() {
    let (identity, channel) = new_channel("a").await;
    let root = channel
        .message_at_offset(0)
        .await
        .expect("offset")
        .expect("root");
    let root_ts = channel.open(&root).expect("open").timestamp;
    let bad = craft(
        &channel,
        &identity,
        vec![*root.hash()],
        1,
        root_ts - 100.0,
        MessageBody::Json("{}".to_string()),
    );
    let err = channel.receive(bad).await.unwrap_err();
    assert_eq!(ban_reason(&err), "timestamp below parents");
}

#[tokio::test]
async fn too_many_parents_is_banned() {
    let (identity, channel) = new_channel("a").await;
    let root_hash = *channel
        .message_at_offset(0)
        .await
        .expect("offset")
        .expect("root")
        .hash();
    let bad = craft(
        &channel,
        &identity,
        vec![root_hash; 129],
        1,
        now_seconds(),
        MessageBody::Json("{}".to_string()),
    );
    let err = channel.receive(bad).await.unwrap_err();
    assert_eq!(ban_reason(&err), "too many parents");
}

#[tokio::test]
async fn non_member_signature_is_banned() {
    let (_identity, channel) = new_channel("a").await;
    let root_hash = *channel
        .message_at_offset(0)
        .await
        .expect("offset")
        .expect("root")
        .hash();

    // An outsider pretending the channel root key signed its message.
    let outsider = Identity::new("x");
    outsider.add_chain(channel.id(), peerlinks::core::chain::Chain::empty());
    let bad = craft(
        &channel,
        &outsider,
        vec![root_hash],
        1,
        now_seconds(),
        MessageBody::Json("{}".to_string()),
    );
    let err = channel.receive(bad).await.unwrap_err();
    assert_eq!(ban_reason(&err), "invalid signature or chain");
}

#[tokio::test]
async fn tampered_ciphertext_is_banned() {
    let (identity, channel) = new_channel("a").await;
    let posted = channel
        .post(MessageBody::Json("{}".to_string()), &identity)
        .await
        .expect("post");
    let mut wm = posted.to_wire();
    let last = wm.encrypted_content.len() - 1;
    wm.encrypted_content[last] ^= 0x01;
    let tampered = Message::from_wire(&wm).expect("shape still fine");
    let err = channel.receive(tampered).await.unwrap_err();
    assert_eq!(ban_reason(&err), "decryption failed");
}

#[tokio::test]
async fn json_limit_depends_on_chain_length() {
    let (storage, metrics, updates) = env();
    let a = Identity::new("a");
    let channel = Channel::create(&a, "a", storage, metrics, updates)
        .await
        .expect("create");

    // Walk a full-length delegation chain a -> b -> c -> d.
    let b = Identity::new("b");
    let c = Identity::new("c");
    let d = Identity::new("d");
    let chain_b = peerlinks::core::chain::Chain::new(vec![a
        .issue_link(channel.id(), b.public_key(), "b", None)
        .expect("issue")])
    .expect("chain");
    b.add_chain(channel.id(), chain_b.clone());
    let chain_c = chain_b
        .append(b.issue_link(channel.id(), c.public_key(), "c", None).expect("issue"))
        .expect("append");
    c.add_chain(channel.id(), chain_c.clone());
    let chain_d = chain_c
        .append(c.issue_link(channel.id(), d.public_key(), "d", None).expect("issue"))
        .expect("append");
    d.add_chain(channel.id(), chain_d);

    // 8192 bytes exactly: `{"pad":""}` is 10 bytes of scaffolding.
    let at_limit = format!(r#"{{"pad":"{}"}}"#, "x".repeat(8182));
    assert_eq!(at_limit.len(), 8192);
    channel
        .post(MessageBody::Json(at_limit), &d)
        .await
        .expect("exactly at the limit is accepted");

    let over_limit = format!(r#"{{"pad":"{}"}}"#, "x".repeat(8183));
    let err = channel
        .post(MessageBody::Json(over_limit), &d)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChannelError::Identity(IdentityError::BodyTooLarge)
    ));
}

#[tokio::test]
async fn siblings_merge_and_linearize() {
    let (identity, channel) = new_channel("a").await;
    let root = channel
        .message_at_offset(0)
        .await
        .expect("offset")
        .expect("root");
    let ts = now_seconds();

    let m1 = craft(
        &channel,
        &identity,
        vec![*root.hash()],
        1,
        ts,
        MessageBody::Json(r#"{"n":1}"#.to_string()),
    );
    let m2 = craft(
        &channel,
        &identity,
        vec![*root.hash()],
        1,
        ts,
        MessageBody::Json(r#"{"n":2}"#.to_string()),
    );
    assert!(channel.receive(m1.clone()).await.expect("receive"));
    assert!(channel.receive(m2.clone()).await.expect("receive"));

    // Both siblings are leaves; the merge post takes both as parents.
    let merge = channel
        .post(MessageBody::Json(r#"{"n":3}"#.to_string()), &identity)
        .await
        .expect("post");
    assert_eq!(merge.height(), 2);
    let mut parents = merge.parents().to_vec();
    parents.sort();
    let mut expected = vec![*m1.hash(), *m2.hash()];
    expected.sort();
    assert_eq!(parents, expected);

    // CRDT order: (height ASC, hash ASC), every message exactly once.
    let count = channel.message_count().await.expect("count");
    assert_eq!(count, 4);
    let mut previous: Option<(i64, Hash32)> = None;
    for offset in 0..count {
        let m = channel
            .message_at_offset(offset)
            .await
            .expect("offset")
            .expect("present");
        let key = (m.height(), *m.hash());
        if let Some(prev) = previous {
            assert!(prev < key, "linearization must be strictly increasing");
        }
        previous = Some(key);
    }
}

#[tokio::test]
async fn symmetric_encryption_roundtrip() {
    let (_identity, channel) = new_channel("a").await;
    let (nonce, sealed) = channel.encrypt(b"attack at dawn").expect("encrypt");
    let opened = channel.decrypt(&sealed, &nonce).expect("decrypt");
    assert_eq!(opened, b"attack at dawn");

    let mut tampered = sealed.clone();
    tampered[0] ^= 0x01;
    let err = channel.decrypt(&tampered, &nonce).unwrap_err();
    assert_eq!(ban_reason(&err), "decryption failed");
}
