// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Provides the [`Read`] trait, analogous to [`std::io::Read`].

use static_assertions::assert_obj_safe;

use crate::io;
use crate::io::endian::BeInt;
use crate::io::endian::LeInt;

/// Represents a place that bytes can be read from, such as a `&[u8]`.
///
/// # Relation with [`std::io::Read`]
/// [`std::io::Read`] is distinct from `Read`, since `Read` must know,
/// a-priori, the total length of the underlying buffer. This is what lets
/// decoders reject a declared length before allocating for it.
pub trait Read {
    /// Reads exactly `n` bytes from `self`.
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error>;

    /// Returns the number of bytes still available to read.
    fn remaining_data(&self) -> usize;

    /// Reads a little-endian integer.
    ///
    /// # Note
    /// Do not implement this function yourself. Callers are not required to
    /// call it in order to actually perform a read, so whether or not it is
    /// called is an implementation detail.
    #[inline]
    fn read_le<I: LeInt>(&mut self) -> Result<I, io::Error>
    where
        Self: Sized,
    {
        I::read_from(self)
    }

    /// Reads a big-endian integer.
    ///
    /// See [`Read::read_le()`].
    #[inline]
    fn read_be<I: BeInt>(&mut self) -> Result<I, io::Error>
    where
        Self: Sized,
    {
        I::read_from(self)
    }

    /// Reads a fixed-size byte array.
    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], io::Error>
    where
        Self: Sized,
    {
        let mut out = [0; N];
        self.read_bytes(&mut out)?;
        Ok(out)
    }

    /// Reads `len` bytes into a freshly-allocated buffer.
    ///
    /// The length is checked against [`Read::remaining_data()`] before
    /// allocating, so an untrusted length prefix cannot cause a huge
    /// allocation.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, io::Error>
    where
        Self: Sized,
    {
        if self.remaining_data() < len {
            return Err(io::Error::BufferExhausted);
        }
        let mut out = vec![0; len];
        self.read_bytes(&mut out)?;
        Ok(out)
    }

    /// Discards `len` bytes.
    fn skip(&mut self, len: usize) -> Result<(), io::Error>
    where
        Self: Sized,
    {
        self.read_vec(len).map(|_| ())
    }
}
assert_obj_safe!(Read);

impl<R: Read + ?Sized> Read for &'_ mut R {
    #[inline]
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        R::read_bytes(*self, out)
    }

    #[inline]
    fn remaining_data(&self) -> usize {
        R::remaining_data(*self)
    }
}

impl Read for &[u8] {
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        let n = out.len();
        if self.len() < n {
            return Err(io::Error::BufferExhausted);
        }

        out.copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(())
    }

    fn remaining_data(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_bytes() {
        let mut bytes: &[u8] = b"Hello!";
        let mut three_bytes = [0; 3];
        bytes.read_bytes(&mut three_bytes).unwrap();
        assert_eq!(&three_bytes[..], b"Hel");
        assert_eq!(bytes.len(), 3);
        assert_eq!(bytes.read_le::<u16>().unwrap(), 0x6f6c);
        assert_eq!(bytes.len(), 1);
        assert!(bytes.read_le::<u32>().is_err());
    }

    #[test]
    fn read_be_and_arrays() {
        let mut bytes: &[u8] = b"LARCHIVE\x00\x00\x01\x00";
        assert_eq!(&bytes.read_array::<8>().unwrap(), b"LARCHIVE");
        assert_eq!(bytes.read_be::<u32>().unwrap(), 0x100);
        assert_eq!(bytes.remaining_data(), 0);
    }

    #[test]
    fn read_vec_rejects_oversized_lengths() {
        let mut bytes: &[u8] = &[1, 2, 3];
        assert_eq!(bytes.read_vec(usize::MAX), Err(io::Error::BufferExhausted));
        assert_eq!(bytes.read_vec(2).unwrap(), vec![1, 2]);
        assert!(bytes.skip(2).is_err());
        assert!(bytes.skip(1).is_ok());
    }
}
