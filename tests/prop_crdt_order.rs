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

use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;

use peerlinks::core::channel::Channel;
use peerlinks::core::identity::Identity;
use peerlinks::core::message::{Message, MessageBody};
use peerlinks::core::types::Hash32;
use peerlinks::monitoring::metrics::Metrics;
use peerlinks::storage::{MemoryStorage, Storage};

fn env() -> (Arc<dyn Storage>, Arc<Metrics>, broadcast::Sender<Hash32>) {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let (updates, _) = broadcast::channel(64);
    (storage, metrics, updates)
}

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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Build a random DAG on one channel, replay it in a scrambled order on
    /// another, and check that both converge to the same linearization and
    /// leaf set.
    #[test]
    fn prop_convergence_and_linearization(
        plan in prop::collection::vec((any::<u16>(), any::<u16>()), 1..20),
        shuffle_seed in any::<u64>(),
    ) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async move {
            let (storage_a, metrics_a, updates_a) = env();
            let identity = Identity::new("a");
            let channel_a = Channel::create(&identity, "a", storage_a.clone(), metrics_a, updates_a)
                .await
                .expect("create");

            let root = channel_a
                .message_at_offset(0)
                .await
                .expect("offset")
                .expect("root");
            let root_ts = channel_a.open(&root).expect("open").timestamp;
            let mut messages: Vec<(Message, f64)> = vec![(root, root_ts)];

            for (i, (p1, p2)) in plan.iter().enumerate() {
                let i1 = (*p1 as usize) % messages.len();
                let i2 = (*p2 as usize) % messages.len();
                let mut picks = vec![i1];
                if i2 != i1 {
                    picks.push(i2);
                }
                let parents: Vec<Hash32> =
                    picks.iter().map(|&p| *messages[p].0.hash()).collect();
                let height = picks.iter().map(|&p| messages[p].0.height()).max().unwrap() + 1;
                let ts = picks
                    .iter()
                    .map(|&p| messages[p].1)
                    .fold(f64::NEG_INFINITY, f64::max)
                    + 0.25;
                let body = MessageBody::Json(format!(r#"{{"n":{i}}}"#));
                let message = craft(&channel_a, &identity, parents, height, ts, body);
                prop_assert!(channel_a.receive(message.clone()).await.expect("receive"));
                messages.push((message, ts));
            }

            // Replay on a second instance of the channel in scrambled order,
            // delivering whatever has its parents satisfied each round.
            let (storage_b, metrics_b, updates_b) = env();
            let channel_b = Channel::new(
                *channel_a.public_key(),
                "a",
                false,
                storage_b.clone(),
                metrics_b,
                updates_b,
            )
            .expect("channel b");

            let mut order: Vec<usize> = (0..messages.len()).collect();
            let mut s = shuffle_seed | 1;
            for i in (1..order.len()).rev() {
                s ^= s << 13;
                s ^= s >> 7;
                s ^= s << 17;
                order.swap(i, (s as usize) % (i + 1));
            }

            let index_of: HashMap<Hash32, usize> = messages
                .iter()
                .enumerate()
                .map(|(i, (m, _))| (*m.hash(), i))
                .collect();
            let mut delivered = vec![false; messages.len()];
            while delivered.iter().any(|d| !d) {
                for &i in &order {
                    if delivered[i] {
                        continue;
                    }
                    let ready = messages[i]
                        .0
                        .parents()
                        .iter()
                        .all(|p| delivered[index_of[p]]);
                    if ready {
                        prop_assert!(
                            channel_b.receive(messages[i].0.clone()).await.expect("receive")
                        );
                        delivered[i] = true;
                    }
                }
            }

            // Same count, same order, strictly increasing (height, hash).
            let count = channel_a.message_count().await.expect("count");
            prop_assert_eq!(count, channel_b.message_count().await.expect("count"));
            let mut previous: Option<(i64, Hash32)> = None;
            for offset in 0..count {
                let ma = channel_a
                    .message_at_offset(offset)
                    .await
                    .expect("offset")
                    .expect("present");
                let mb = channel_b
                    .message_at_offset(offset)
                    .await
                    .expect("offset")
                    .expect("present");
                prop_assert_eq!(ma.hash(), mb.hash());
                let key = (ma.height(), *ma.hash());
                if let Some(prev) = previous {
                    prop_assert!(prev < key);
                }
                previous = Some(key);
            }

            // Leaves closure: accepted hashes minus every referenced parent.
            let all: BTreeSet<Hash32> = messages.iter().map(|(m, _)| *m.hash()).collect();
            let referenced: BTreeSet<Hash32> = messages
                .iter()
                .flat_map(|(m, _)| m.parents().iter().copied())
                .collect();
            let expected: BTreeSet<Hash32> = all.difference(&referenced).copied().collect();
            for (storage, channel) in [(&storage_a, &channel_a), (&storage_b, &channel_b)] {
                let leaves: BTreeSet<Hash32> = storage
                    .get_leaves(channel.id())
                    .await
                    .expect("leaves")
                    .iter()
                    .map(|m| *m.hash())
                    .collect();
                prop_assert_eq!(&leaves, &expected);
            }

            // Receiving any message again is a no-op.
            let (m, _) = &messages[messages.len() / 2];
            prop_assert!(!channel_b.receive(m.clone()).await.expect("receive"));
            Ok(())
        })?;
    }
}
