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

use peerlinks::core::channel::Channel;
use peerlinks::core::identity::Identity;
use peerlinks::core::message::MessageBody;
use peerlinks::core::types::Hash32;
use peerlinks::monitoring::metrics::Metrics;
use peerlinks::storage::{Cursor, SledStorage, Storage};

fn channel_env(
    storage: Arc<dyn Storage>,
) -> (Arc<dyn Storage>, Arc<Metrics>, broadcast::Sender<Hash32>) {
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let (updates, _) = broadcast::channel(64);
    (storage, metrics, updates)
}

#[tokio::test]
async fn sled_storage_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("db");
    let path = path.to_str().expect("utf8 path");

    let (channel_pub, hashes) = {
        let storage: Arc<dyn Storage> = Arc::new(SledStorage::open(path).expect("open"));
        let (storage, metrics, updates) = channel_env(storage);
        let identity = Identity::new("a");
        let channel = Channel::create(&identity, "a", storage.clone(), metrics, updates)
            .await
            .expect("create");

        let mut hashes = Vec::new();
        for n in 0..5 {
            let m = channel
                .post(MessageBody::Json(format!(r#"{{"n":{n}}}"#)), &identity)
                .await
                .expect("post");
            hashes.push(*m.hash());
        }

        // Entity blobs round-trip.
        storage
            .store_entity("identity", "cafe", b"blob")
            .await
            .expect("store entity");
        assert_eq!(
            storage
                .retrieve_entity("identity", "cafe")
                .await
                .expect("retrieve"),
            Some(b"blob".to_vec())
        );
        assert_eq!(
            storage.get_entity_keys("identity").await.expect("keys"),
            vec!["cafe".to_string()]
        );
        storage
            .remove_entity("identity", "cafe")
            .await
            .expect("remove");
        assert_eq!(
            storage
                .retrieve_entity("identity", "cafe")
                .await
                .expect("retrieve"),
            None
        );

        (*channel.public_key(), hashes)
    };

    // Reopen from disk and check the channel state is intact.
    let storage: Arc<dyn Storage> = Arc::new(SledStorage::open(path).expect("reopen"));
    let (storage, metrics, updates) = channel_env(storage);
    let channel =
        Channel::new(channel_pub, "a", false, storage.clone(), metrics, updates).expect("channel");

    assert_eq!(channel.message_count().await.expect("count"), 6);
    for hash in &hashes {
        assert!(storage
            .get_message(channel.id(), hash)
            .await
            .expect("get")
            .is_some());
    }

    // Single chain of posts: exactly one leaf, the last post.
    let leaves = storage.get_leaves(channel.id()).await.expect("leaves");
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].hash(), hashes.last().expect("last"));

    // The linearization is strictly increasing in (height, hash).
    let mut previous: Option<(i64, Hash32)> = None;
    for offset in 0..6 {
        let m = storage
            .get_message_at_offset(channel.id(), offset)
            .await
            .expect("offset")
            .expect("present");
        let key = (m.height(), *m.hash());
        if let Some(prev) = previous {
            assert!(prev < key);
        }
        previous = Some(key);
    }

    // Query slices agree with the CRDT order and report continuations.
    let slice = storage
        .query(channel.id(), &Cursor::Height(0), false, 3)
        .await
        .expect("query");
    assert_eq!(slice.messages.len(), 3);
    assert!(slice.backward_hash.is_none());
    let forward = slice.forward_hash.expect("more messages follow");

    let rest = storage
        .query(channel.id(), &Cursor::Hash(forward), false, 10)
        .await
        .expect("query");
    assert_eq!(rest.messages.len(), 3);
    assert!(rest.forward_hash.is_none());
    assert_eq!(rest.backward_hash, Some(forward));

    let back = storage
        .query(channel.id(), &Cursor::Hash(forward), true, 2)
        .await
        .expect("query");
    assert_eq!(back.messages.len(), 2);
    assert_eq!(*back.messages[1].hash(), hashes[1]);

    // Unknown hash cursors are lenient.
    let empty = storage
        .query(
            channel.id(),
            &Cursor::Hash(Hash32::from_bytes([9u8; 32])),
            false,
            10,
        )
        .await
        .expect("query");
    assert!(empty.messages.is_empty());
}
