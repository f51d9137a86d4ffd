// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Boot Guard and CBnT key and boot policy manifests.
//!
//! Keys and signatures are filler patterns; they are well-formed, but do
//! not verify.

use crate::bytes::*;

/// A SHA-256 algorithm ID.
pub const SHA256: u16 = 0x000b;

/// A SHA-384 algorithm ID.
pub const SHA384: u16 = 0x000c;

/// The null algorithm ID.
pub const NULL: u16 = 0x0010;

fn struct_info(buf: &mut Vec<u8>, id: &[u8; 8], version: u8) {
    buf.extend_from_slice(id);
    buf.push(version);
}

fn cbnt_struct_info(
    buf: &mut Vec<u8>,
    id: &[u8; 8],
    version: u8,
    variable0: u8,
    element_size: u16,
) {
    struct_info(buf, id, version);
    buf.push(variable0);
    le16(buf, element_size);
}

fn hash_structure(buf: &mut Vec<u8>, alg: u16, digest: &[u8]) {
    le16(buf, alg);
    le16(buf, digest.len() as u16);
    buf.extend_from_slice(digest);
}

fn patch16(buf: &mut [u8], offset: usize, x: u16) {
    buf[offset..offset + 2].copy_from_slice(&x.to_le_bytes());
}

/// Returns an RSA key-signature pair with a `bits`-bit key, an RSASSA
/// signature made with `hash_alg`, and key material derived from `seed`.
pub fn key_signature(bits: u16, hash_alg: u16, seed: u8) -> Vec<u8> {
    let bytes = bits as usize / 8;
    let mut buf = Vec::new();
    buf.push(0x10);

    le16(&mut buf, 0x0001);
    buf.push(0x10);
    le16(&mut buf, bits);
    le32(&mut buf, 0x10001);
    buf.extend_from_slice(&pattern(seed, bytes));

    le16(&mut buf, 0x0014);
    buf.push(0x10);
    le16(&mut buf, bits);
    le16(&mut buf, hash_alg);
    buf.extend_from_slice(&pattern(seed ^ 0xff, bytes));
    buf
}

/// Returns a Boot Guard key manifest vouching for a boot policy key with
/// the given SHA-256 digest.
///
/// `KMSVN` is 1.
pub fn bg_key_manifest(bp_key_digest: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    struct_info(&mut buf, b"__KEYM__", 0x10);
    buf.push(0x10); // KMVersion.
    buf.push(1); // KMSVN.
    buf.push(0x0f); // KMID.
    hash_structure(&mut buf, SHA256, bp_key_digest);
    buf.extend_from_slice(&key_signature(2048, SHA256, 0x42));
    buf
}

/// Returns a Boot Guard boot policy manifest.
///
/// It has one IBB element with two 64K segments right below 4G, an entry
/// point at the reset vector and a `NEMDataStack` of 0x100, followed by
/// eight bytes of platform data and a 2048-bit key signature.
pub fn bg_boot_policy_manifest() -> Vec<u8> {
    let mut buf = Vec::new();

    struct_info(&mut buf, b"__ACBP__", 0x10);
    buf.push(0x01); // HdrStructVersion.
    buf.push(0x02); // PMBPMVersion.
    buf.push(0x00); // BPMSVN.
    buf.push(0x02); // ACMSVNAuth.
    buf.push(0x00);
    le16(&mut buf, 0x100);

    struct_info(&mut buf, b"__IBBS__", 0x10);
    buf.extend_from_slice(&[0, 0, 0]); // Reserved0, SetNumber, Reserved1.
    buf.push(0x0f); // PBETValue.
    le32(&mut buf, 0x2);
    le64(&mut buf, 0xfed1_0000);
    le64(&mut buf, 0xfed9_1000);
    le32(&mut buf, 0x10_0000);
    le32(&mut buf, 0x20_0000);
    buf.extend_from_slice(&[0; 8]);
    hash_structure(&mut buf, NULL, &[]);
    le32(&mut buf, 0xffff_fff0);
    hash_structure(&mut buf, SHA256, &pattern(7, 32));
    buf.push(2);
    for &base in &[0xfffe_0000, 0xffff_0000] {
        buf.extend_from_slice(&[0, 0]);
        le16(&mut buf, 0);
        le32(&mut buf, base);
        le32(&mut buf, 0x1_0000);
    }

    struct_info(&mut buf, b"__PMDA__", 0x10);
    le16(&mut buf, 8);
    buf.extend_from_slice(&pattern(9, 8));

    struct_info(&mut buf, b"__PMSG__", 0x10);
    buf.extend_from_slice(&key_signature(2048, SHA256, 0x24));
    buf
}

/// Returns a CBnT key manifest with two SHA-384 key hashes: the boot
/// policy key digest given, and an ACM key.
///
/// `KMSVN` is 2; the key is 3072 bits.
pub fn cbnt_key_manifest(bpm_key_digest: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    cbnt_struct_info(&mut buf, b"__KEYM__", 0x21, 0, 0);
    le16(&mut buf, 0); // KeyManifestSignatureOffset, patched below.
    buf.extend_from_slice(&[0; 3]);
    buf.push(0x01); // Revision.
    buf.push(2); // KMSVN.
    buf.push(0x01); // KMID.
    le16(&mut buf, SHA384);

    le16(&mut buf, 2);
    le64(&mut buf, 1 << 0);
    hash_structure(&mut buf, SHA384, bpm_key_digest);
    le64(&mut buf, 1 << 2);
    hash_structure(&mut buf, SHA384, &pattern(0x61, 48));

    let offset = buf.len() as u16;
    patch16(&mut buf, 12, offset);
    buf.extend_from_slice(&key_signature(3072, SHA384, 0x99));
    buf
}

/// Returns a CBnT boot policy manifest.
///
/// It has one IBB element whose digest list carries a SHA-256 and a
/// SHA-384 digest, a 20-byte TXT element, a 16-byte PCD element, six bytes
/// of platform data, and a signature element whose `ElementSize` is zero.
/// The key is 3072 bits.
pub fn cbnt_boot_policy_manifest() -> Vec<u8> {
    let mut buf = Vec::new();

    cbnt_struct_info(&mut buf, b"__ACBP__", 0x23, 0x20, 20);
    le16(&mut buf, 0); // KeySignatureOffset, patched below.
    buf.push(0x01); // BPMRevision.
    buf.push(0x00); // BPMSVN.
    buf.push(0x00); // ACMSVNAuth.
    buf.push(0x00);
    le16(&mut buf, 0x100);

    let se = buf.len();
    cbnt_struct_info(&mut buf, b"__IBBS__", 0x20, 0, 0);
    buf.extend_from_slice(&[0, 0, 0]); // Reserved0, SetNumber, Reserved1.
    buf.push(0x0f); // PBETValue.
    le32(&mut buf, 0x3);
    le64(&mut buf, 0xfed1_0000);
    le64(&mut buf, 0xfed9_1000);
    le32(&mut buf, 0x10_0000);
    le32(&mut buf, 0x20_0000);
    le64(&mut buf, 0);
    le64(&mut buf, 0);
    hash_structure(&mut buf, NULL, &[]);
    le32(&mut buf, 0xffff_fff0);
    le16(&mut buf, 4 + (4 + 32) + (4 + 48));
    le16(&mut buf, 2);
    hash_structure(&mut buf, SHA256, &pattern(0x11, 32));
    hash_structure(&mut buf, SHA384, &pattern(0x12, 48));
    hash_structure(&mut buf, SHA256, &pattern(0x13, 32));
    buf.extend_from_slice(&[0; 3]);
    buf.push(1);
    buf.extend_from_slice(&[0, 0]);
    le16(&mut buf, 0);
    le32(&mut buf, 0xfffe_0000);
    le32(&mut buf, 0x2_0000);
    let se_len = (buf.len() - se) as u16;
    patch16(&mut buf, se + 10, se_len);

    cbnt_struct_info(&mut buf, b"__TXTS__", 0x21, 0, 12 + 20);
    buf.extend_from_slice(&pattern(0x31, 20));

    cbnt_struct_info(&mut buf, b"__PCDS__", 0x20, 0, 12 + 16);
    buf.extend_from_slice(&pattern(0x41, 16));

    cbnt_struct_info(&mut buf, b"__PMDA__", 0x21, 0, 12 + 4 + 6);
    buf.extend_from_slice(&[0, 0]);
    le16(&mut buf, 6);
    buf.extend_from_slice(&pattern(0x51, 6));

    cbnt_struct_info(&mut buf, b"__PMSG__", 0x20, 0, 0);
    let offset = buf.len() as u16;
    patch16(&mut buf, 12, offset);
    buf.extend_from_slice(&key_signature(3072, SHA384, 0x77));
    buf
}
