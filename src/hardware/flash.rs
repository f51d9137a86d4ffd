// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Flash abstraction.
//!
//! This module provides the [`Flash`] trait, which represents an *abstract
//! flash device*: a region of memory that can be read or programmed at
//! arbitrary offsets. Such a "device" can range from a simple Rust slice to
//! an SPI flash chip (or even a subregion of it, such as a single FMAP area).

use core::convert::TryInto;

use static_assertions::assert_obj_safe;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::io;

/// A [`Flash`] error.
///
/// All of these errors are non-retryable; a [`Flash`] implementation should
/// block until the operation succeeds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates that an operation failed because the requested
    /// operation was outside of the device's address space.
    OutOfRange,

    /// Indicates that the device is locked in some manner and cannot
    /// be affected by the operation.
    Locked,

    /// Indicates that an unspecified error occured.
    Unspecified,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Error::OutOfRange => write!(f, "flash access out of range"),
            Error::Locked => write!(f, "flash device is read-only"),
            Error::Unspecified => write!(f, "unspecified flash error"),
        }
    }
}

/// Provides access to a flash-like storage device.
///
/// This trait provides abstract operations on a device, as if it were a
/// block of random-access memory. It is the implementation's responsibility
/// to implement these operations efficiently with respect to the underlying
/// device.
pub trait Flash {
    /// Returns the size, in bytes, of this device.
    fn size(&self) -> Result<u32, Error>;

    /// Attempts to read `out.len()` bytes starting at `offset`.
    fn read(&self, offset: u32, out: &mut [u8]) -> Result<(), Error>;

    /// Attempts to write `buf.len()` bytes starting at `offset`.
    ///
    /// Note that this function is not guaranteed to succeed (and be
    /// reflected in the return value of `read`) until `flush()` is called.
    fn program(&mut self, offset: u32, buf: &[u8]) -> Result<(), Error>;

    /// Flushes any pending `program()` operations.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
assert_obj_safe!(Flash);

impl<F: Flash + ?Sized> Flash for &F {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        F::size(self)
    }

    #[inline]
    fn read(&self, offset: u32, out: &mut [u8]) -> Result<(), Error> {
        F::read(self, offset, out)
    }

    #[inline]
    fn program(&mut self, _: u32, _: &[u8]) -> Result<(), Error> {
        Err(Error::Locked)
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        Err(Error::Locked)
    }
}

impl<F: Flash + ?Sized> Flash for &mut F {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        F::size(self)
    }

    #[inline]
    fn read(&self, offset: u32, out: &mut [u8]) -> Result<(), Error> {
        F::read(self, offset, out)
    }

    #[inline]
    fn program(&mut self, offset: u32, buf: &[u8]) -> Result<(), Error> {
        F::program(self, offset, buf)
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        F::flush(self)
    }
}

/// Convenience functions for whole-region flash reads.
#[extend::ext(name = FlashExt)]
pub impl<F: Flash + ?Sized> F {
    /// Reads the entirety of `region` into a freshly allocated buffer.
    fn read_region(&self, region: Region) -> Result<Vec<u8>, Error> {
        check_region(region, self.size()?)?;
        let mut buf = vec![0; region.len as usize];
        self.read(region.offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads the entire device into a freshly allocated buffer.
    fn read_all(&self) -> Result<Vec<u8>, Error> {
        self.read_region(Region::new(0, self.size()?))
    }
}

fn check_region(region: Region, size: u32) -> Result<(), Error> {
    match region.end() {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::OutOfRange),
    }
}

/// Adapter for working with a sub-region of a [`Flash`] type.
///
/// Reads and writes on the device will be constrained to a given [`Region`].
/// This is how FMAP areas are exposed as devices in their own right.
#[derive(Copy, Clone)]
pub struct SubFlash<F>(pub F, pub Region);

impl<F: Flash> SubFlash<F> {
    fn translate(&self, offset: u32, len: usize) -> Result<u32, Error> {
        let len: u32 = len.try_into().map_err(|_| Error::OutOfRange)?;
        let end = offset.checked_add(len).ok_or(Error::OutOfRange)?;
        if end > self.1.len {
            return Err(Error::OutOfRange);
        }
        offset.checked_add(self.1.offset).ok_or(Error::OutOfRange)
    }
}

impl<F: Flash> Flash for SubFlash<F> {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        Ok(self.1.len)
    }

    #[inline]
    fn read(&self, offset: u32, out: &mut [u8]) -> Result<(), Error> {
        let offset = self.translate(offset, out.len())?;
        self.0.read(offset, out)
    }

    #[inline]
    fn program(&mut self, offset: u32, buf: &[u8]) -> Result<(), Error> {
        let offset = self.translate(offset, buf.len())?;
        self.0.program(offset, buf)
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        self.0.flush()
    }
}

/// Adapter for converting RAM-backed storage into a read-only [`Flash`].
///
/// For the purposes of this type, "RAM-backed" means that `AsRef<[u8]>`
/// is implemented.
#[derive(Copy, Clone)]
pub struct Ram<Bytes>(pub Bytes);

fn ram_size(bytes: &[u8]) -> Result<u32, Error> {
    bytes.len().try_into().map_err(|_| Error::Unspecified)
}

fn ram_slice(bytes: &[u8], offset: u32, len: usize) -> Result<&[u8], Error> {
    let start = offset as usize;
    let end = start.checked_add(len).ok_or(Error::OutOfRange)?;
    bytes.get(start..end).ok_or(Error::OutOfRange)
}

impl<Bytes: AsRef<[u8]>> Flash for Ram<Bytes> {
    fn size(&self) -> Result<u32, Error> {
        ram_size(self.0.as_ref())
    }

    #[inline]
    fn read(&self, offset: u32, out: &mut [u8]) -> Result<(), Error> {
        out.copy_from_slice(ram_slice(self.0.as_ref(), offset, out.len())?);
        Ok(())
    }

    fn program(&mut self, _: u32, _: &[u8]) -> Result<(), Error> {
        Err(Error::Locked)
    }
}

/// Adapter for converting mutable, RAM-backed storage into a [`Flash`].
///
/// For the purposes of this type, "RAM-backed" means that `AsRef<[u8]>`
/// and `AsMut<[u8]>` are implemented.
#[derive(Copy, Clone)]
pub struct RamMut<Bytes>(pub Bytes);

impl<Bytes: AsRef<[u8]> + AsMut<[u8]>> Flash for RamMut<Bytes> {
    fn size(&self) -> Result<u32, Error> {
        ram_size(self.0.as_ref())
    }

    #[inline]
    fn read(&self, offset: u32, out: &mut [u8]) -> Result<(), Error> {
        out.copy_from_slice(ram_slice(self.0.as_ref(), offset, out.len())?);
        Ok(())
    }

    fn program(&mut self, offset: u32, buf: &[u8]) -> Result<(), Error> {
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or(Error::OutOfRange)?;
        self.0
            .as_mut()
            .get_mut(start..end)
            .ok_or(Error::OutOfRange)?
            .copy_from_slice(buf);
        Ok(())
    }
}

/// A [`io::Write`] implementation for programming a [`Flash`] serially,
/// starting at some offset.
pub struct FlashIo<F> {
    flash: F,
    cursor: u32,
}

impl<F: Flash> FlashIo<F> {
    /// Creates a new `FlashIo`, writing from `offset` onwards.
    pub fn new(flash: F, offset: u32) -> Self {
        Self {
            flash,
            cursor: offset,
        }
    }

    /// Returns the current write offset.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }
}

impl<F: Flash> io::Write for FlashIo<F> {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        self.flash
            .program(self.cursor, buf)
            .map_err(|_| io::Error::BufferExhausted)?;
        self.cursor += buf.len() as u32;
        Ok(())
    }
}

/// A region within a [`Flash`] type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Region {
    /// The offset of the start of this region.
    pub offset: u32,
    /// The length of the region, in bytes.
    pub len: u32,
}

impl Region {
    /// Convenience method for creating a `Region` without having to use
    /// a struct literal.
    pub const fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// Returns the first offset past the end of this region, if it does not
    /// overflow.
    pub fn end(self) -> Option<u32> {
        self.offset.checked_add(self.len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ram_read_program() {
        let mut buf = [0u8; 16];
        let mut flash = RamMut(&mut buf[..]);
        flash.program(4, b"ORBC").unwrap();
        assert_eq!(flash.program(14, b"ORBC"), Err(Error::OutOfRange));

        let mut out = [0u8; 4];
        flash.read(4, &mut out).unwrap();
        assert_eq!(&out, b"ORBC");
        assert_eq!(flash.read_region(Region::new(15, 2)), Err(Error::OutOfRange));
    }

    #[test]
    fn read_only_ram() {
        let mut flash = Ram(vec![0xffu8; 8]);
        assert_eq!(flash.program(0, &[0]), Err(Error::Locked));
        assert_eq!(flash.read_all().unwrap(), vec![0xff; 8]);
    }

    #[test]
    fn sub_flash() {
        let mut buf = *b"0123456789abcdef";
        let mut sub = SubFlash(RamMut(&mut buf[..]), Region::new(4, 8));
        assert_eq!(sub.size().unwrap(), 8);
        assert_eq!(sub.read_all().unwrap(), b"456789ab".to_vec());

        sub.program(6, b"XY").unwrap();
        assert_eq!(sub.program(7, b"XY"), Err(Error::OutOfRange));
        assert_eq!(&buf, b"0123456789XYcdef");
    }

    #[test]
    fn flash_io() {
        use crate::io::Write as _;

        let mut buf = [0u8; 8];
        let mut w = FlashIo::new(RamMut(&mut buf[..]), 2);
        w.write_le(0xaabbu16).unwrap();
        w.write_be(0xccddu16).unwrap();
        assert_eq!(w.cursor(), 6);
        assert!(w.write_bytes(&[0; 4]).is_err());
        assert_eq!(buf, [0, 0, 0xbb, 0xaa, 0xcc, 0xdd, 0, 0]);
    }
}
