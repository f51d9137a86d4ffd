// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for locating and decoding an FMAP.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fwimage::fmap::Fmap;

fuzz_target!(|data: &[u8]| {
    if let Ok((fmap, _)) = Fmap::locate(data) {
        // Whatever decodes must encode back into an identical map.
        let mut bytes = Vec::new();
        fmap.encode(&mut bytes).unwrap();
        assert_eq!(bytes.len(), fmap.encoded_len());
        assert_eq!(Fmap::decode(&bytes).unwrap(), fmap);
    }
});
