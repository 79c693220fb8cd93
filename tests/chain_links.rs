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

use peerlinks::core::chain::{Chain, ChainError};
use peerlinks::core::identity::Identity;
use peerlinks::core::types::Hash32;

fn channel_id() -> Hash32 {
    Hash32::from_bytes([7u8; 32])
}

#[test]
fn issued_link_verifies_within_window() {
    let root = Identity::new("root");
    let member = Identity::new("member");
    let id = channel_id();

    let link = root
        .issue_link(&id, member.public_key(), "member", Some((1000.0, 2000.0)))
        .expect("issue");
    assert!(link.verify(root.public_key(), &id, 1000.0));
    assert!(link.verify(root.public_key(), &id, 1999.0));
    // Outside the window.
    assert!(!link.verify(root.public_key(), &id, 999.0));
    assert!(!link.verify(root.public_key(), &id, 2000.0));
    // Wrong signer.
    assert!(!link.verify(member.public_key(), &id, 1500.0));
    // Wrong channel binding.
    assert!(!link.verify(root.public_key(), &Hash32::from_bytes([8u8; 32]), 1500.0));
}

#[test]
fn expired_link_fails_chain_verification() {
    let root = Identity::new("root");
    let member = Identity::new("member");
    let id = channel_id();

    let link = root
        .issue_link(&id, member.public_key(), "member", Some((0.0, 100.0)))
        .expect("issue");
    let chain = Chain::new(vec![link]).expect("chain");
    assert_eq!(
        chain.verify(root.public_key(), &id, 100.0),
        Err(ChainError::InvalidChain)
    );
}

#[test]
fn link_window_limits_enforced_on_issue() {
    let root = Identity::new("root");
    let member = Identity::new("member");
    let id = channel_id();

    // 99 days is the maximum.
    let too_long = 99.0 * 24.0 * 3600.0 + 1.0;
    assert!(root
        .issue_link(&id, member.public_key(), "m", Some((0.0, too_long)))
        .is_err());
    // Inverted windows are rejected.
    assert!(root
        .issue_link(&id, member.public_key(), "m", Some((100.0, 100.0)))
        .is_err());
    // Display names are capped at 128 bytes.
    let long_name = "x".repeat(129);
    assert!(root
        .issue_link(&id, member.public_key(), &long_name, None)
        .is_err());
}

#[test]
fn chain_walk_returns_leaf_key() {
    let root = Identity::new("root");
    let b = Identity::new("b");
    let c = Identity::new("c");
    let id = channel_id();

    let link_ab = root
        .issue_link(&id, b.public_key(), "b", Some((0.0, 1000.0)))
        .expect("issue ab");
    let link_bc = b
        .issue_link(&id, c.public_key(), "c", Some((0.0, 1000.0)))
        .expect("issue bc");

    let chain = Chain::new(vec![link_ab, link_bc]).expect("chain");
    let leaf = chain.verify(root.public_key(), &id, 500.0).expect("verify");
    assert_eq!(&leaf, c.public_key());

    // Empty chains resolve to the channel root key.
    let empty = Chain::empty();
    let leaf = empty.verify(root.public_key(), &id, 500.0).expect("verify");
    assert_eq!(&leaf, root.public_key());
}

#[test]
fn chain_length_is_bounded() {
    let root = Identity::new("root");
    let id = channel_id();
    let mut links = Vec::new();
    let mut issuer = root;
    for i in 0..3 {
        let next = Identity::new(&format!("id{i}"));
        links.push(
            issuer
                .issue_link(&id, next.public_key(), "next", Some((0.0, 1000.0)))
                .expect("issue"),
        );
        issuer = next;
    }
    let chain = Chain::new(links.clone()).expect("three links are fine");
    let extra = issuer
        .issue_link(&id, Identity::new("last").public_key(), "last", Some((0.0, 1000.0)))
        .expect("issue");
    assert_eq!(chain.append(extra.clone()).unwrap_err(), ChainError::TooLong);
    links.push(extra);
    assert_eq!(Chain::new(links).unwrap_err(), ChainError::TooLong);
}

#[test]
fn chain_ordering_prefers_shorter() {
    let root = Identity::new("root");
    let b = Identity::new("b");
    let c = Identity::new("c");
    let id = channel_id();

    let short = Chain::new(vec![root
        .issue_link(&id, b.public_key(), "b", Some((0.0, 1000.0)))
        .expect("issue")])
    .expect("chain");
    let long = Chain::new(vec![
        root.issue_link(&id, b.public_key(), "b", Some((0.0, 1000.0)))
            .expect("issue"),
        b.issue_link(&id, c.public_key(), "c", Some((0.0, 1000.0)))
            .expect("issue"),
    ])
    .expect("chain");

    assert!(short.is_better_than(&long));
    assert!(!long.is_better_than(&short));
    // Same length ties break on the last trustee key bytes.
    let other = Chain::new(vec![root
        .issue_link(&id, c.public_key(), "c", Some((0.0, 1000.0)))
        .expect("issue")])
    .expect("chain");
    assert_eq!(
        short.is_better_than(&other),
        b.public_key() < c.public_key()
    );
}

#[test]
fn chain_verification_survives_wire_roundtrip() {
    let root = Identity::new("root");
    let b = Identity::new("b");
    let id = channel_id();

    let chain = Chain::new(vec![root
        .issue_link(&id, b.public_key(), "b", Some((0.0, 1000.0)))
        .expect("issue")])
    .expect("chain");

    let wire = chain.to_wire();
    // Channel id never travels with the link.
    assert!(wire[0].tbs.as_ref().expect("tbs").channel_id.is_empty());
    let decoded = Chain::from_wire(&wire).expect("decode");
    assert_eq!(decoded, chain);
    assert_eq!(
        decoded.verify(root.public_key(), &id, 500.0).expect("verify"),
        *b.public_key()
    );
}
