// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Provides a "cursor" over a mutable byte buffer.
//!
//! [`Cursor`] implements [`Write`] over a fixed slice, failing rather than
//! growing once the slice is full. It is how CBFS records are re-encoded in
//! place, with the consumed length checked against the original:
//! ```
//! # use fwimage::io::*;
//! let mut image = [0xffu8; 64];
//!
//! let mut cursor = Cursor::new(&mut image[16..]);
//! cursor.write_bytes(b"__FMAP__").unwrap();
//! cursor.write_le::<u8>(1).unwrap();
//!
//! assert_eq!(cursor.consumed_len(), 9);
//! assert_eq!(&image[16..24], b"__FMAP__");
//! ```

use crate::io;
use crate::io::Write;

/// A cursor over a buffer of memory.
///
/// See the [module documentation](index.html) for more information.
pub struct Cursor<'a> {
    buf: &'a mut [u8],
    // Invariant: cursor <= buf.len().
    cursor: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a new `Cursor` for the given buffer.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    /// Consumes `n` bytes from the underlying buffer.
    ///
    /// If `n` bytes are unavailable, `BufferExhausted` is returned.
    pub fn consume(&mut self, n: usize) -> Result<&mut [u8], io::Error> {
        let end = self
            .cursor
            .checked_add(n)
            .ok_or(io::Error::BufferExhausted)?;
        if self.buf.len() < end {
            return Err(io::Error::BufferExhausted);
        }
        let output = &mut self.buf[self.cursor..end];
        self.cursor = end;

        Ok(output)
    }

    /// Returns the number of bytes consumed thus far.
    pub fn consumed_len(&self) -> usize {
        self.cursor
    }

    /// Returns the portion of the buffer which has been consumed thus far.
    pub fn consumed_bytes(&self) -> &[u8] {
        &self.buf[..self.cursor]
    }
}

impl Write for Cursor<'_> {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        let dest = self.consume(buf.len())?;
        dest.copy_from_slice(buf);
        Ok(())
    }
}
