// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! A small Intel-style firmware image with a FIT.
//!
//! The image is `IMAGE_SIZE` bytes of erased flash, mapped to end at 4GiB,
//! holding:
//!
//! | offset             | contents                          |
//! |--------------------|-----------------------------------|
//! | `MICROCODE_OFFSET` | a microcode update                |
//! | `ACM_OFFSET`       | a version 3 startup ACM           |
//! | `KM_OFFSET`        | a CBnT key manifest               |
//! | `BPM_OFFSET`       | a CBnT boot policy manifest       |
//! | `TABLE_OFFSET`     | the FIT, `ENTRY_COUNT` entries    |
//!
//! The FIT lists, in order: the header, the microcode, the ACM, the key
//! manifest, the boot policy manifest, and a TXT policy record pointing at
//! CMOS. Every header is exactly what header recalculation would produce.

use crate::bytes::*;
use crate::data::manifest;

/// The total size of the image.
pub const IMAGE_SIZE: usize = 0x10000;

/// The offset of the microcode update.
pub const MICROCODE_OFFSET: usize = 0x1000;

/// The length of the microcode update.
pub const MICROCODE_LEN: usize = 0x800;

/// The offset of the startup ACM.
pub const ACM_OFFSET: usize = 0x2000;

/// The offset of the key manifest.
pub const KM_OFFSET: usize = 0x3000;

/// The offset of the boot policy manifest.
pub const BPM_OFFSET: usize = 0x4000;

/// The offset of the FIT.
pub const TABLE_OFFSET: usize = 0xf000;

/// The number of FIT entries, header included.
pub const ENTRY_COUNT: usize = 6;

/// The address field of the TXT policy record: CMOS index 0x0c, bit 0.
pub const TXT_POLICY_ADDRESS: u64 = 0x000c_0008_0071_0070;

/// Returns the physical address of `offset` in the image.
pub fn phys(offset: usize) -> u64 {
    (1 << 32) - (IMAGE_SIZE - offset) as u64
}

/// Returns encoded FIT entry headers, with a correct checksum if `cv` is
/// set.
pub fn entry(address: u64, size: u32, version: u16, ty: u8, cv: bool) -> [u8; 16] {
    let mut buf = Vec::new();
    le64(&mut buf, address);
    buf.extend_from_slice(&size.to_le_bytes()[..3]);
    buf.push(0);
    le16(&mut buf, version);
    buf.push(if cv { ty | 0x80 } else { ty });
    buf.push(0);
    if cv {
        let sum = buf.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        buf[15] = 0u8.wrapping_sub(sum);
    }

    let mut out = [0; 16];
    out.copy_from_slice(&buf);
    out
}

/// Returns a microcode update `MICROCODE_LEN` bytes long, whose header
/// declares that same total size.
pub fn microcode() -> Vec<u8> {
    let mut buf = Vec::new();
    le32(&mut buf, 1); // Header version.
    le32(&mut buf, 0x2a); // Update revision.
    le32(&mut buf, 0x0101_2020); // Date.
    le32(&mut buf, 0x906ea); // Processor signature.
    le32(&mut buf, 0); // Checksum.
    le32(&mut buf, 1); // Loader revision.
    le32(&mut buf, 0); // Processor flags.
    le32(&mut buf, MICROCODE_LEN as u32 - 48); // Data size.
    le32(&mut buf, MICROCODE_LEN as u32); // Total size.
    buf.resize(48, 0);
    buf.extend_from_slice(&pattern(0x5c, MICROCODE_LEN - 48));
    buf
}

/// Returns an ACM with the given header version, a `KeySize` field of
/// `key_size_dwords`, and a user area of `user_area_len` bytes.
///
/// The key and signature are `key_size_dwords * 4` bytes long; version 0
/// ACMs also carry an exponent. The scratch area has the length the
/// version requires (or none, for unknown versions).
pub fn acm(header_version: u32, key_size_dwords: u32, user_area_len: usize) -> Vec<u8> {
    let key_len = key_size_dwords as usize * 4;
    let exponent_len = if header_version == 0 { 4 } else { 0 };
    let scratch_len = match header_version {
        0 => 572,
        0x30000 => 832,
        _ => 0,
    };
    let header_len = 128 + 2 * key_len + exponent_len;
    let total = header_len + scratch_len + user_area_len;

    let mut buf = Vec::new();
    le16(&mut buf, 2); // ModuleType.
    le16(&mut buf, 0); // ModuleSubType.
    le32(&mut buf, header_len as u32 / 4);
    le32(&mut buf, header_version);
    le16(&mut buf, 0); // ChipsetID.
    le16(&mut buf, 0); // Flags.
    le32(&mut buf, 0x8086); // ModuleVendor.
    le32(&mut buf, 0x2020_0101); // Date.
    le32(&mut buf, total as u32 / 4);
    le16(&mut buf, 2); // TxtSVN.
    le16(&mut buf, 1); // SeSVN.
    le32(&mut buf, 0); // CodeControl.
    le32(&mut buf, 0); // ErrorEntryPoint.
    le32(&mut buf, 0x28); // GDTLimit.
    le32(&mut buf, 0x1000); // GDTBasePtr.
    le32(&mut buf, 0x8); // SegSel.
    le32(&mut buf, 0x2000); // EntryPoint.
    buf.extend_from_slice(&[0; 64]);
    le32(&mut buf, key_size_dwords);
    le32(&mut buf, scratch_len as u32 / 4);

    buf.extend_from_slice(&pattern(0x21, key_len));
    if exponent_len != 0 {
        le32(&mut buf, 0x10001);
    }
    buf.extend_from_slice(&pattern(0x22, key_len));
    buf.resize(buf.len() + scratch_len, 0);
    buf.extend_from_slice(&pattern(0x23, user_area_len));
    buf
}

fn padded16(mut data: Vec<u8>) -> Vec<u8> {
    align(&mut data, 16, 0);
    data
}

/// Returns the firmware image.
pub fn image() -> Vec<u8> {
    let mut image = vec![0xff; IMAGE_SIZE];
    let mut place = |offset: usize, data: &[u8]| {
        image[offset..offset + data.len()].copy_from_slice(data);
    };

    let km = padded16(manifest::cbnt_key_manifest(&[0x33; 48]));
    let bpm = padded16(manifest::cbnt_boot_policy_manifest());

    place(MICROCODE_OFFSET, &microcode());
    place(ACM_OFFSET, &acm(0x30000, 96, 64));
    place(KM_OFFSET, &km);
    place(BPM_OFFSET, &bpm);

    let mut table = Vec::new();
    let magic = u64::from_le_bytes(*b"_FIT_   ");
    table.extend_from_slice(&entry(magic, ENTRY_COUNT as u32, 0x0100, 0x00, true));
    table.extend_from_slice(&entry(
        phys(MICROCODE_OFFSET),
        (MICROCODE_LEN / 16) as u32,
        0x0100,
        0x01,
        true,
    ));
    table.extend_from_slice(&entry(phys(ACM_OFFSET), 0, 0x0100, 0x02, true));
    table.extend_from_slice(&entry(
        phys(KM_OFFSET),
        (km.len() / 16) as u32,
        0x0100,
        0x0b,
        true,
    ));
    table.extend_from_slice(&entry(
        phys(BPM_OFFSET),
        (bpm.len() / 16) as u32,
        0x0100,
        0x0c,
        true,
    ));
    table.extend_from_slice(&entry(TXT_POLICY_ADDRESS, 0, 0, 0x0a, false));
    place(TABLE_OFFSET, &table);

    place(IMAGE_SIZE - 0x40, &phys(TABLE_OFFSET).to_le_bytes());
    image
}
