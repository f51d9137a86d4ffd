// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! A small coreboot-style flash image.
//!
//! The image is `ROM_SIZE` bytes: an FMAP at offset zero describing an
//! `FMAP` area and a `COREBOOT` area, the latter holding a CBFS with one
//! record of most interesting types, in this order:
//!
//! | name                     | type        |
//! |--------------------------|-------------|
//! | `cbfs master header`     | master      |
//! | `fallback/romstage`      | legacy stage|
//! | `fallback/ramstage`      | stage (LZMA)|
//! | `fallback/payload`       | SELF        |
//! | `config`                 | raw         |
//! | `cmos_layout.bin`        | CMOS layout |
//! | `cpu_microcode_blob.bin` | microcode   |
//! | `vendor/mystery`         | unknown     |
//! | (empty)                  | deleted     |
//! | `bootblock`              | bootblock   |
//!
//! The bootblock ends exactly at the end of the `COREBOOT` area, and the
//! empty record fills all space between the unknown record and the
//! bootblock.

use crate::bytes::*;

/// The total size of the image.
pub const ROM_SIZE: u32 = 0x20000;

/// The offset of the `COREBOOT` area.
pub const CBFS_OFFSET: u32 = 0x800;

/// The size of the `COREBOOT` area.
pub const CBFS_SIZE: u32 = ROM_SIZE - CBFS_OFFSET;

/// The names of the records in the CBFS, in order.
pub const RECORD_NAMES: &[&str] = &[
    "cbfs master header",
    "fallback/romstage",
    "fallback/ramstage",
    "fallback/payload",
    "config",
    "cmos_layout.bin",
    "cpu_microcode_blob.bin",
    "vendor/mystery",
    "",
    "bootblock",
];

/// The contents of the `config` file.
pub const CONFIG: &[u8] = b"CONFIG_ARCH_X86=y\nCONFIG_FMAP=y\n";

/// The type used for the unknown record.
pub const MYSTERY_TYPE: u32 = 0x7777;

/// The length of the bootblock's body.
pub const BOOTBLOCK_LEN: usize = 0x100;

/// The (pretend-compressed) body of `fallback/ramstage`.
pub fn ramstage_body() -> Vec<u8> {
    pattern(0x33, 96)
}

/// Encodes a compression attribute.
pub fn compression_attr(algo: u32, decompressed_size: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    be32(&mut buf, 0x42435a4c);
    be32(&mut buf, 16);
    be32(&mut buf, algo);
    be32(&mut buf, decompressed_size);
    buf
}

/// Encodes a stage header attribute.
pub fn stage_attr(load: u64, entry_offset: u32, memlen: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    be32(&mut buf, 0x53746748);
    be32(&mut buf, 24);
    be64(&mut buf, load);
    be32(&mut buf, entry_offset);
    be32(&mut buf, memlen);
    buf
}

/// Appends a CBFS file at the next 16-byte boundary of `area`, returning its
/// offset.
///
/// The name is NUL-terminated and padded such that the header plus name is a
/// multiple of 16 bytes long.
pub fn push_file(
    area: &mut Vec<u8>,
    ty: u32,
    name: &str,
    attrs: &[u8],
    data: &[u8],
) -> usize {
    let name_len = (24 + name.len() + 1 + 15) / 16 * 16 - 24;
    push_file_raw(area, ty, name.as_bytes(), name_len, attrs, data)
}

/// Like [`push_file()`], but with an explicit name region length.
pub fn push_file_raw(
    area: &mut Vec<u8>,
    ty: u32,
    name: &[u8],
    name_len: usize,
    attrs: &[u8],
    data: &[u8],
) -> usize {
    align(area, 16, 0xff);
    let start = area.len();
    let attr_offset = if attrs.is_empty() { 0 } else { 24 + name_len };
    area.extend_from_slice(b"LARCHIVE");
    be32(area, data.len() as u32);
    be32(area, ty);
    be32(area, attr_offset as u32);
    be32(area, (24 + name_len + attrs.len()) as u32);
    padded(area, name, name_len);
    area.extend_from_slice(attrs);
    area.extend_from_slice(data);
    start
}

fn master_header() -> Vec<u8> {
    let mut buf = Vec::new();
    be32(&mut buf, 0x4f524243);
    be32(&mut buf, 0x31313132);
    be32(&mut buf, ROM_SIZE);
    be32(&mut buf, 0x130);
    be32(&mut buf, 64);
    be32(&mut buf, CBFS_OFFSET);
    be32(&mut buf, 1);
    be32(&mut buf, 0);
    buf
}

fn legacy_stage() -> Vec<u8> {
    let code = pattern(0x11, 64);
    let mut buf = Vec::new();
    le32(&mut buf, 0);
    le64(&mut buf, 0xfffe_1000);
    le64(&mut buf, 0xfffe_1000);
    le32(&mut buf, code.len() as u32);
    le32(&mut buf, 0x80);
    buf.extend(code);
    buf
}

fn self_payload() -> Vec<u8> {
    let segment = |buf: &mut Vec<u8>, ty: &[u8; 4], offset, load, len, memlen| {
        buf.extend_from_slice(ty);
        be32(buf, 0);
        be32(buf, offset);
        be64(buf, load);
        be32(buf, len);
        be32(buf, memlen);
    };
    let mut buf = Vec::new();
    segment(&mut buf, b"CODE", 3 * 28, 0x80_0000, 32, 32);
    segment(&mut buf, b" BSS", 0, 0x80_0020, 0, 0x1000);
    segment(&mut buf, b"ENTR", 0, 0x80_0000, 0, 0);
    buf.extend(pattern(0x55, 32));
    buf
}

/// Builds the `COREBOOT` area on its own.
pub fn cbfs() -> Vec<u8> {
    let mut area = Vec::new();
    push_file(&mut area, 0x02, RECORD_NAMES[0], &[], &master_header());
    push_file(&mut area, 0x10, RECORD_NAMES[1], &[], &legacy_stage());

    let mut attrs = compression_attr(1, 0x180);
    attrs.extend(stage_attr(0x10_0000, 0x20, 0x200));
    push_file(&mut area, 0x11, RECORD_NAMES[2], &attrs, &ramstage_body());

    push_file(&mut area, 0x20, RECORD_NAMES[3], &[], &self_payload());
    push_file(
        &mut area,
        0x50,
        RECORD_NAMES[4],
        &compression_attr(0, CONFIG.len() as u32),
        CONFIG,
    );
    push_file(&mut area, 0x1aa, RECORD_NAMES[5], &[], &pattern(0x77, 40));
    push_file(&mut area, 0x53, RECORD_NAMES[6], &[], &pattern(0x99, 48));
    push_file(&mut area, MYSTERY_TYPE, RECORD_NAMES[7], &[], &[0xff; 32]);

    align(&mut area, 16, 0xff);
    let bootblock_start = CBFS_SIZE as usize - 48 - BOOTBLOCK_LEN;
    let empty_len = bootblock_start - area.len() - 0x28;
    push_file_raw(&mut area, 0xffffffff, b"", 16, &[], &vec![0xff; empty_len]);

    let start = push_file(
        &mut area,
        0x01,
        RECORD_NAMES[9],
        &[],
        &pattern(0xbb, BOOTBLOCK_LEN),
    );
    assert_eq!(start, bootblock_start);
    assert_eq!(area.len(), CBFS_SIZE as usize);
    area
}

/// Builds the whole flash image.
pub fn rom() -> Vec<u8> {
    let mut rom = crate::data::fmap::encode_with_base(
        1,
        1,
        0x1_0000_0000 - ROM_SIZE as u64,
        ROM_SIZE,
        "FLASH",
        &[
            (0, CBFS_OFFSET, "FMAP", 0x1),
            (CBFS_OFFSET, CBFS_SIZE, "COREBOOT", 0x0),
        ],
    );
    rom.resize(CBFS_OFFSET as usize, 0xff);
    rom.extend(cbfs());
    rom
}
