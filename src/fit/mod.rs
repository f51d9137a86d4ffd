// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Intel Firmware Interface Tables (FIT).
//!
//! A FIT is a table of 16-byte [`EntryHeaders`] describing the components
//! the CPU and the startup ACM look at before running any firmware code:
//! microcode, the startup ACM itself, Boot Guard manifests, TXT policy, and
//! so on.
//!
//! # Addressing
//!
//! Firmware images are mapped so that they end at 4GiB. Every address in a
//! FIT is a physical address in that mapping, which [`phys_to_offset()`]
//! and [`offset_to_phys()`] translate to and from offsets into the image.
//!
//! The table is found through the *FIT pointer*: a little-endian `u64`
//! physical address stored [`POINTER_OFFSET`] bytes before the end of the
//! image. The first entry of the table is a header entry whose address
//! field holds [`HEADERS_MAGIC`] and whose size field holds the number of
//! entries, itself included.
//!
//! # Entries
//!
//! [`get_entries()`] decodes the table and the data each entry points to
//! into an [`Entries`] list. Problems with a single entry do not abort the
//! walk; they are recorded in that entry's [`EntryBase::headers_errors`].

use core::fmt;

use crate::hardware::flash;
use crate::io;
use crate::io::Read as _;
use crate::manifest;

mod acm;
mod entry;
mod headers;
mod table;
mod txt;

pub use acm::Acm;
pub use acm::AcmHeader;
pub use acm::AcmHeaderVersion;
pub use acm::ACM_HEADER_LEN;
pub use entry::Entry;
pub use entry::EntryBase;
pub use entry::EntryData;
pub use headers::EntryHeaders;
pub use headers::EntryType;
pub use headers::HEADERS_LEN;
pub use table::Entries;
pub use txt::PolicyAddress;

/// The physical address the end of a firmware image is mapped at.
pub const BASE_PHYS_ADDR: u64 = 1 << 32;

/// The distance of the FIT pointer from the end of the image.
pub const POINTER_OFFSET: usize = 0x40;

/// The contents of the address field of the FIT header entry.
pub const HEADERS_MAGIC: &[u8; 8] = b"_FIT_   ";

/// The version most entries carry.
pub const ENTRY_VERSION: u16 = 0x0100;

/// An error returned by a FIT operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates an error in a low-level [`io`] type.
    Io(io::Error),

    /// Indicates that an error occured in a [`flash`] type.
    Flash(flash::Error),

    /// Indicates that decoding a manifest failed.
    Manifest(manifest::Error),

    /// Indicates that a byte range lies outside of the image.
    OutOfBounds {
        /// The start of the range.
        start: usize,
        /// The end of the range.
        end: usize,
        /// The length of the image.
        len: usize,
    },

    /// Indicates that a physical address does not map into the image.
    AddressOutOfBounds {
        /// The address.
        addr: u64,
        /// The length of the image.
        len: usize,
    },

    /// Indicates that the first table entry does not carry
    /// [`HEADERS_MAGIC`].
    ExpectedHeadersMagic,

    /// Indicates that an operation is not implemented for an entry type.
    NotSupported(EntryType),

    /// Indicates that an entry's checksum does not match its contents.
    ChecksumMismatch,

    /// Indicates that an entry's data is too long for its size field.
    DataTooLarge(usize),

    /// Indicates that an ACM's key size does not match its header version.
    InvalidKeySize {
        /// The key length the header version requires, in bytes.
        expected: usize,
        /// The key length the ACM declares, in bytes.
        actual: usize,
    },

    /// Indicates that an ACM has a header version this crate does not know.
    UnknownAcmHeaderVersion(u32),

    /// Indicates that an ACM's declared size is smaller than its fixed
    /// header.
    UserAreaTooSmall,

    /// Indicates that a TXT policy entry has an unknown version.
    UnknownTxtPolicyVersion(u16),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<flash::Error> for Error {
    fn from(e: flash::Error) -> Self {
        Self::Flash(e)
    }
}

impl From<manifest::Error> for Error {
    fn from(e: manifest::Error) -> Self {
        Self::Manifest(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "fit: {}", e),
            Error::Flash(e) => write!(f, "fit: {}", e),
            Error::Manifest(e) => write!(f, "fit: {}", e),
            Error::OutOfBounds { start, end, len } => write!(
                f,
                "range [{:#x}, {:#x}) out of bounds for length {:#x}",
                start, end, len
            ),
            Error::AddressOutOfBounds { addr, len } => write!(
                f,
                "physical address {:#x} is outside of an image of length {:#x}",
                addr, len
            ),
            Error::ExpectedHeadersMagic => {
                write!(f, "expected FIT headers magic {:?}", "_FIT_   ")
            }
            Error::NotSupported(ty) => {
                write!(f, "operation not supported for {} entries", ty)
            }
            Error::ChecksumMismatch => write!(f, "entry checksum mismatch"),
            Error::DataTooLarge(len) => {
                write!(f, "entry data of length {:#x} is too large", len)
            }
            Error::InvalidKeySize { expected, actual } => write!(
                f,
                "invalid key size: expected {} bytes, got {}",
                expected, actual
            ),
            Error::UnknownAcmHeaderVersion(v) => {
                write!(f, "unknown ACM header version {:#x}", v)
            }
            Error::UserAreaTooSmall => write!(f, "UserArea too small"),
            Error::UnknownTxtPolicyVersion(v) => {
                write!(f, "unknown TXT policy version {:#x}", v)
            }
        }
    }
}

/// Returns `buf[start..start + len]`, or a bounds error.
pub(crate) fn slice(buf: &[u8], start: usize, len: usize) -> Result<&[u8], Error> {
    let end = match start.checked_add(len) {
        Some(end) if end <= buf.len() => end,
        _ => {
            return fail!(Error::OutOfBounds {
                start,
                end: start.saturating_add(len),
                len: buf.len(),
            })
        }
    };
    Ok(&buf[start..end])
}

/// Converts a physical address into an offset into an image of length
/// `len`.
pub fn phys_to_offset(addr: u64, len: usize) -> Result<usize, Error> {
    let offset = BASE_PHYS_ADDR
        .checked_sub(addr)
        .and_then(|below| (len as u64).checked_sub(below));
    match offset {
        Some(offset) => Ok(offset as usize),
        None => fail!(Error::AddressOutOfBounds { addr, len }),
    }
}

/// Converts an offset into an image of length `len` into a physical address.
pub fn offset_to_phys(offset: usize, len: usize) -> Result<u64, Error> {
    let addr = len
        .checked_sub(offset)
        .and_then(|below| BASE_PHYS_ADDR.checked_sub(below as u64));
    match addr {
        Some(addr) => Ok(addr),
        None => fail!(Error::OutOfBounds {
            start: offset,
            end: offset,
            len,
        }),
    }
}

/// Reads the FIT pointer of `image`.
pub fn pointer(image: &[u8]) -> Result<u64, Error> {
    let start = match image.len().checked_sub(POINTER_OFFSET) {
        Some(start) => start,
        None => {
            return fail!(Error::OutOfBounds {
                start: 0,
                end: POINTER_OFFSET,
                len: image.len(),
            })
        }
    };
    let mut r = slice(image, start, 8)?;
    Ok(r.read_le::<u64>()?)
}

/// Finds the FIT in `image`, returning the range of offsets its entry
/// headers occupy.
pub fn get_headers_table_range(image: &[u8]) -> Result<(usize, usize), Error> {
    let start = phys_to_offset(pointer(image)?, image.len())?;
    let first = EntryHeaders::read(slice(image, start, HEADERS_LEN)?)?;
    check!(
        &first.address.to_le_bytes() == HEADERS_MAGIC,
        Error::ExpectedHeadersMagic
    );

    let len = first.size as usize * HEADERS_LEN;
    slice(image, start, len)?;
    trace!("FIT at {:#x}, {} entries", start, first.size);
    Ok((start, start + len))
}

/// Decodes the entry headers of the FIT in `image`.
pub fn get_table(image: &[u8]) -> Result<Vec<EntryHeaders>, Error> {
    let (start, end) = get_headers_table_range(image)?;
    image[start..end]
        .chunks(HEADERS_LEN)
        .map(EntryHeaders::read)
        .collect()
}

/// Decodes the FIT in `image`, together with the data of every entry.
pub fn get_entries(image: &[u8]) -> Result<Entries, Error> {
    let entries = get_table(image)?
        .into_iter()
        .map(|headers| Entry::decode(headers, image))
        .collect();
    Ok(Entries(entries))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use testutil::data::fit;

    #[test]
    fn addresses() {
        let len = fit::IMAGE_SIZE;
        assert_eq!(phys_to_offset(0xffff_f000, len).unwrap(), 0xf000);
        assert_eq!(offset_to_phys(0xf000, len).unwrap(), 0xffff_f000);
        assert_eq!(phys_to_offset(BASE_PHYS_ADDR, len).unwrap(), len);
        assert_eq!(
            phys_to_offset(0xfffe_0000, len),
            Err(Error::AddressOutOfBounds {
                addr: 0xfffe_0000,
                len
            })
        );
        assert!(phys_to_offset(BASE_PHYS_ADDR + 1, len).is_err());
        assert!(offset_to_phys(len + 1, len).is_err());
    }

    #[test]
    fn table_range() {
        let image = fit::image();
        assert_eq!(pointer(&image).unwrap(), fit::phys(fit::TABLE_OFFSET));
        assert_eq!(
            get_headers_table_range(&image).unwrap(),
            (
                fit::TABLE_OFFSET,
                fit::TABLE_OFFSET + fit::ENTRY_COUNT * HEADERS_LEN
            )
        );

        let table = get_table(&image).unwrap();
        let types = table
            .iter()
            .map(|h| h.entry_type())
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec![
                Some(EntryType::FitHeader),
                Some(EntryType::Microcode),
                Some(EntryType::Sacm),
                Some(EntryType::KeyManifest),
                Some(EntryType::BootPolicyManifest),
                Some(EntryType::TxtPolicy),
            ]
        );
    }

    #[test]
    fn bad_headers_magic() {
        let mut image = fit::image();
        image[fit::TABLE_OFFSET + 4] = b'X';
        let e = get_headers_table_range(&image).unwrap_err();
        assert_eq!(e, Error::ExpectedHeadersMagic);
        assert!(e.to_string().contains("expected FIT headers magic"));
    }

    #[test]
    fn pointer_out_of_bounds() {
        let mut image = fit::image();
        let ptr = image.len() - POINTER_OFFSET;

        image[ptr..ptr + 8].copy_from_slice(&0xfff0_0000u64.to_le_bytes());
        assert!(matches!(
            get_entries(&image),
            Err(Error::AddressOutOfBounds { .. })
        ));

        image[ptr..ptr + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            get_entries(&image),
            Err(Error::AddressOutOfBounds { .. })
        ));

        // Right at the end of the image: the header entry does not fit.
        image[ptr..ptr + 8].copy_from_slice(&BASE_PHYS_ADDR.to_le_bytes());
        assert!(matches!(
            get_entries(&image),
            Err(Error::OutOfBounds { .. })
        ));

        assert!(matches!(
            get_table(&image[..0x20]),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn entry_count_out_of_bounds() {
        let mut image = fit::image();
        image[fit::TABLE_OFFSET + 8] = 0xff;
        image[fit::TABLE_OFFSET + 9] = 0xff;
        assert!(matches!(
            get_headers_table_range(&image),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
