// Copyright (c) 2026 PeerLinks
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Wire frames come straight off the socket; decoding must never panic.
    let _ = peerlinks::core::wire::decode_packet(data);
    let _ = peerlinks::core::wire::decode_hello(data);
});
