// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! FMAP blobs.

use crate::bytes::*;

/// The number of times the junk prefix is repeated in [`fake_flash()`].
pub const FAKE_FLASH_JUNK_REPEATS: usize = 94387;

/// The junk prefix in [`fake_flash()`].
pub const FAKE_FLASH_JUNK: &[u8; 4] = b"\x01\x02\x03\x04";

/// Encodes an FMAP header and area table.
///
/// Areas are given as `(offset, size, name, flags)`. The base address is
/// always zero.
pub fn encode(
    ver_major: u8,
    ver_minor: u8,
    size: u32,
    name: &str,
    areas: &[(u32, u32, &str, u16)],
) -> Vec<u8> {
    encode_with_base(ver_major, ver_minor, 0, size, name, areas)
}

/// Like [`encode()`], but with an explicit base address.
pub fn encode_with_base(
    ver_major: u8,
    ver_minor: u8,
    base: u64,
    size: u32,
    name: &str,
    areas: &[(u32, u32, &str, u16)],
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"__FMAP__");
    buf.push(ver_major);
    buf.push(ver_minor);
    le64(&mut buf, base);
    le32(&mut buf, size);
    padded(&mut buf, name.as_bytes(), 32);
    le16(&mut buf, areas.len() as u16);
    for &(offset, size, name, flags) in areas {
        le32(&mut buf, offset);
        le32(&mut buf, size);
        padded(&mut buf, name.as_bytes(), 32);
        le16(&mut buf, flags);
    }
    buf
}

/// A flash image consisting of a long junk prefix followed by an FMAP with
/// two areas.
///
/// The FMAP starts at `4 * FAKE_FLASH_JUNK_REPEATS`.
pub fn fake_flash() -> Vec<u8> {
    let mut buf = FAKE_FLASH_JUNK.repeat(FAKE_FLASH_JUNK_REPEATS);
    buf.extend(encode_with_base(
        1,
        0,
        0xcafebabedeadbeef,
        0x44332211,
        "Fake flash",
        &[
            (0xdeadbeef, 0x11111111, "Area Number 1\0\0\0Hello", 0x1013),
            (
                0xcafebabe,
                0x22222222,
                "Area Number 2xxxxxxxxxxxxxxxxxxx",
                0x0000,
            ),
        ],
    ));
    buf
}
