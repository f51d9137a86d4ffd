// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Internal `serde` helpers.

use core::fmt;
use core::fmt::LowerHex;
use core::fmt::Write as _;

use serde::Serializer;

/// Helper for using as a `write!()` target without allocating.
struct ArrayBuf<const N: usize>([u8; N], usize);

impl<const N: usize> AsRef<str> for ArrayBuf<N> {
    fn as_ref(&self) -> &str {
        core::str::from_utf8(&self.0[..self.1]).unwrap_or("")
    }
}

impl<const N: usize> Default for ArrayBuf<N> {
    fn default() -> Self {
        Self([0; N], 0)
    }
}

impl<const N: usize> fmt::Write for ArrayBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let space_left = N - self.1;
        if space_left < bytes.len() {
            return Err(fmt::Error);
        }

        self.0[self.1..self.1 + bytes.len()].copy_from_slice(bytes);
        self.1 += bytes.len();
        Ok(())
    }
}

/// Serializes an integer as hex.
pub fn se_hex<S, X>(x: X, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    X: LowerHex,
{
    let mut buf = ArrayBuf::<18>::default();
    let _ = write!(buf, "0x{:x}", x);
    s.serialize_str(buf.as_ref())
}

/// Serializes a NUL-padded name field as a string, dropping the padding.
pub fn se_cstr<S>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&crate::cstr_lossy(bytes))
}
