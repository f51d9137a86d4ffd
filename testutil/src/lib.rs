// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Test-only utilities for `fwimage`.
//!
//! Fixtures are assembled by hand, byte by byte, so that they do not depend
//! on the codecs they are used to test.

#![deny(missing_docs)]

pub mod data;

/// Little helpers for assembling binary fixtures.
pub mod bytes {
    /// Appends `x` in little-endian order.
    pub fn le16(buf: &mut Vec<u8>, x: u16) {
        buf.extend_from_slice(&x.to_le_bytes());
    }

    /// Appends `x` in little-endian order.
    pub fn le32(buf: &mut Vec<u8>, x: u32) {
        buf.extend_from_slice(&x.to_le_bytes());
    }

    /// Appends `x` in little-endian order.
    pub fn le64(buf: &mut Vec<u8>, x: u64) {
        buf.extend_from_slice(&x.to_le_bytes());
    }

    /// Appends `x` in big-endian order.
    pub fn be32(buf: &mut Vec<u8>, x: u32) {
        buf.extend_from_slice(&x.to_be_bytes());
    }

    /// Appends `x` in big-endian order.
    pub fn be64(buf: &mut Vec<u8>, x: u64) {
        buf.extend_from_slice(&x.to_be_bytes());
    }

    /// Appends `s`, NUL-padded (or truncated) to exactly `len` bytes.
    pub fn padded(buf: &mut Vec<u8>, s: &[u8], len: usize) {
        let n = s.len().min(len);
        buf.extend_from_slice(&s[..n]);
        buf.resize(buf.len() + len - n, 0);
    }

    /// Pads `buf` with `fill` until its length is a multiple of `align`.
    pub fn align(buf: &mut Vec<u8>, align: usize, fill: u8) {
        while buf.len() % align != 0 {
            buf.push(fill);
        }
    }

    /// A deterministic, non-repeating filler pattern.
    pub fn pattern(seed: u8, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }
}
