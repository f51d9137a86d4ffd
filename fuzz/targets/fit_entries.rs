// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for decoding a FIT and the data its entries point to.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fwimage::fit;

fuzz_target!(|data: &[u8]| {
    if let Ok(entries) = fit::get_entries(data) {
        for entry in &entries.0 {
            let _ = entry.parse_data();
        }
        let _ = entries.to_string();
    }
});
