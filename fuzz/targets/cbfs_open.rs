// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for walking a CBFS.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fwimage::cbfs::Image;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut image) = Image::new(data.to_vec()) {
        let _ = image.to_string();
        let _ = image.update();
    }
});
