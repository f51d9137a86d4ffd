// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for the key and boot policy manifest decoders.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fwimage::manifest::BootPolicyManifest;
use fwimage::manifest::KeyManifest;

fuzz_target!(|data: &[u8]| {
    if let Ok((km, _)) = KeyManifest::read_from(data) {
        let mut out = Vec::new();
        let _ = km.write_to(&mut out);
    }
    if let Ok((bpm, _)) = BootPolicyManifest::read_from(data) {
        let mut out = Vec::new();
        let _ = bpm.write_to(&mut out);
    }
});
