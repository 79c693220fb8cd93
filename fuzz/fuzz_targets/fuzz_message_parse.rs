// Copyright (c) 2026 PeerLinks
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use prost::Message as ProstMessage;

use peerlinks::core::message::Message;
use peerlinks::core::wire;

fuzz_target!(|data: &[u8]| {
    // Bulk responses carry remote-controlled message records; parsing and
    // shape checks must never panic.
    if let Ok(wm) = wire::ChannelMessage::decode(data) {
        let _ = Message::from_wire(&wm);
    }
});
