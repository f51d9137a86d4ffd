// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The coreboot file system (CBFS).
//!
//! A CBFS lives in the `COREBOOT` area of a flash image's [FMAP], and is a
//! contiguous sequence of 16-byte aligned, type-tagged [`File`]s. Unlike FMAP,
//! CBFS integers are big-endian (with the exception of the legacy stage
//! sub-header).
//!
//! [`Image`] is the entry point: it locates the CBFS, decodes every file into
//! a [`Record`], supports removing files, and writes the records back into
//! the image buffer with [`Image::update()`].
//!
//! [FMAP]: ../fmap/index.html

use core::fmt;

use crate::fmap;
use crate::io;

pub mod compress;
mod file;
mod image;
mod master;
mod payload;
mod record;
mod stage;

pub use compress::Compression;
pub use compress::Decompress;
pub use file::Attribute;
pub use file::AttributeTag;
pub use file::Attributes;
pub use file::CompressionAttr;
pub use file::File;
pub use file::FileType;
pub use file::ALIGNMENT;
pub use file::FILE_HEADER_LEN;
pub use file::FILE_MAGIC;
pub use image::Image;
pub use master::Architecture;
pub use master::MasterHeader;
pub use master::MASTER_MAGIC;
pub use payload::PayloadRecord;
pub use payload::Segment;
pub use payload::SegmentType;
pub use record::Record;
pub use record::Summary;
pub use stage::LegacyStageHeader;
pub use stage::LegacyStageRecord;
pub use stage::StageHeader;
pub use stage::StageRecord;

/// An error returned by a CBFS operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates an error in a low-level [`io`] type.
    Io(io::Error),

    /// Indicates that locating or reading the FMAP failed.
    Fmap(fmap::Error),

    /// Indicates that the FMAP has no `COREBOOT` area.
    NoCbfsArea,

    /// Indicates that a byte range lies outside of its container.
    OutOfBounds {
        /// The start of the range.
        start: usize,
        /// The end of the range.
        end: usize,
        /// The length of the container.
        len: usize,
    },

    /// Indicates that a structure's magic number did not match.
    BadMagic,

    /// Indicates that no file has the requested name.
    NotFound,

    /// Indicates that the requested file may not be removed.
    PermissionDenied,

    /// Indicates that a re-encoded record would extend past the end of the
    /// `COREBOOT` area.
    RegionOutOfBounds {
        /// The offset of the offending record within the area.
        record_start: u32,
        /// The encoded length of the record.
        len: usize,
    },

    /// Indicates that a file is compressed with an unknown algorithm.
    UnsupportedCompression(u32),

    /// Indicates that the decompression collaborator failed.
    Decompress,

    /// Indicates that reading or writing a host file failed.
    Host(std::io::ErrorKind),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<fmap::Error> for Error {
    fn from(e: fmap::Error) -> Self {
        Self::Fmap(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "cbfs: {}", e),
            Error::Fmap(e) => write!(f, "cbfs: {}", e),
            Error::NoCbfsArea => write!(f, "no COREBOOT area in FMAP"),
            Error::OutOfBounds { start, end, len } => write!(
                f,
                "range [{:#x}, {:#x}) out of bounds for length {:#x}",
                start, end, len
            ),
            Error::BadMagic => write!(f, "bad magic"),
            Error::NotFound => write!(f, "file not found"),
            Error::PermissionDenied => write!(f, "permission denied"),
            Error::RegionOutOfBounds { record_start, len } => write!(
                f,
                "record at {:#x} of length {:#x} overruns the COREBOOT area",
                record_start, len
            ),
            Error::UnsupportedCompression(c) => {
                write!(f, "unsupported compression {:#x}", c)
            }
            Error::Decompress => write!(f, "decompression failed"),
            Error::Host(kind) => write!(f, "host I/O error: {:?}", kind),
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
