// Copyright (c) 2026 PeerLinks
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Config files are operator-supplied; parsing must never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = peerlinks::core::config::NodeConfig::parse(s);
    }
});
