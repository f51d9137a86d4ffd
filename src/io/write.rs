// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Provides the [`Write`] trait, analogous to [`std::io::Write`].

use core::mem;

use static_assertions::assert_obj_safe;

use crate::io;
use crate::io::endian::BeInt;
use crate::io::endian::LeInt;

/// Represents a place that bytes can be written to, such as a `&mut [u8]`
/// or a `Vec<u8>`.
///
/// # Relation with [`std::io::Write`]
/// [`std::io::Write`] provides approximately a superset of `Write`, with
/// more detailed errors. [`StdWrite`] provides an implementation of
/// `Write` in terms of [`std::io::Write`].
pub trait Write {
    /// Attempt to write `buf` exactly to `self`.
    ///
    /// This function does not perform partial writes: it will either block
    /// until completion or return an error.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error>;

    /// Writes a little-endian integer.
    ///
    /// # Note
    /// Do not implement this function yourself. Callers are not required to
    /// call it in order to actually perform a write, so whether or not it is
    /// called is an implementation detail.
    #[inline]
    fn write_le<I: LeInt>(&mut self, val: I) -> Result<(), io::Error>
    where
        Self: Sized,
    {
        val.write_to(self)
    }

    /// Writes a big-endian integer.
    ///
    /// See [`Write::write_le()`].
    #[inline]
    fn write_be<I: BeInt>(&mut self, val: I) -> Result<(), io::Error>
    where
        Self: Sized,
    {
        val.write_to(self)
    }
}

assert_obj_safe!(Write);

impl<W: Write + ?Sized> Write for &'_ mut W {
    #[inline]
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        W::write_bytes(*self, buf)
    }
}

impl Write for &'_ mut [u8] {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        let n = buf.len();
        if self.len() < n {
            return Err(io::Error::BufferExhausted);
        }

        let (dest, rest) = mem::replace(self, &mut []).split_at_mut(n);
        dest.copy_from_slice(buf);
        *self = rest;
        Ok(())
    }
}

impl Write for Vec<u8> {
    #[inline]
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

/// Converts a [`std::io::Write`] into a [`fwimage::io::Write`].
///
/// [`fwimage::io::Write::write_bytes()`] is implemented by simply calling
/// [`std::io::Write::write_all()`].
///
/// This type is provided instead of implementing [`fwimage::io::Write`]
/// directly for every [`std::io::Write`] due to trait coherence issues
/// involving the blanket impl on `&mut _`.
///
/// [`fwimage::io::Write`]: Write
/// [`fwimage::io::Write::write_bytes()`]: Write::write_bytes
pub struct StdWrite<W>(pub W);

impl<W: std::io::Write> Write for StdWrite<W> {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        // No good way to propagate the std error. =/
        self.0.write_all(buf).map_err(|_| io::Error::Internal)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::Read;

    #[test]
    fn read_and_write_bytes() {
        let mut buf = [0; 6];
        let mut bytes = &mut buf[..];
        bytes.write_bytes(b"Wo").unwrap();
        bytes.write_bytes(b"r").unwrap();
        assert_eq!(bytes.len(), 3);
        bytes.write_le::<u16>(0x646c).unwrap();
        assert_eq!(bytes.len(), 1);
        assert!(bytes.write_bytes(b"!!").is_err());
        bytes.write_le::<u8>(b'!').unwrap();
        assert_eq!(bytes.len(), 0);
        assert_eq!(&buf, b"World!");

        let mut bytes = &buf[..];
        assert_eq!(bytes.read_le::<u32>().unwrap(), 0x6c726f57);
    }

    #[test]
    fn vec_write() {
        let mut out = Vec::new();
        out.write_be::<u32>(0x4f524243).unwrap();
        out.write_le::<u16>(0x0102).unwrap();
        assert_eq!(out, b"ORBC\x02\x01");
    }

    #[test]
    fn std_write() {
        let mut buf = [0; 4];
        let mut std_write = StdWrite(&mut buf[..]);
        std_write.write_le::<u32>(0x04030201).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }
}
