// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Flash area maps (FMAP).
//!
//! An FMAP is a small table, found anywhere in a flash image by scanning for
//! the [`SIGNATURE`], which names byte ranges ("areas") of the image. All of
//! its fields are little-endian.
//!
//! The entry point is [`Fmap::locate()`], which returns the decoded map plus
//! [`Metadata`] recording where it was found, so that it can be written back
//! in place with [`Fmap::write_back()`].

use core::convert::TryFrom;
use core::fmt;

use enumflags2::bitflags;
use enumflags2::BitFlags;
use zerocopy::byteorder::LittleEndian;
use zerocopy::byteorder::U16;
use zerocopy::byteorder::U32;
use zerocopy::byteorder::U64;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::LayoutVerified;
use zerocopy::Unaligned;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::hardware::flash;
use crate::hardware::flash::Flash;
use crate::hardware::flash::FlashExt as _;
use crate::hardware::flash::FlashIo;
use crate::hardware::flash::Region;
use crate::hardware::flash::SubFlash;
use crate::io;

/// The FMAP signature, which is not NUL-terminated.
pub const SIGNATURE: &[u8; 8] = b"__FMAP__";

/// The only supported major version.
pub const VERSION_MAJOR: u8 = 1;

/// The length of an encoded FMAP name field.
pub const NAME_LEN: usize = 32;

/// The name of the area holding the CBFS.
pub const COREBOOT_AREA: &str = "COREBOOT";

#[derive(Clone, Copy, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
struct RawHeader {
    signature: [u8; 8],
    ver_major: u8,
    ver_minor: u8,
    base: U64<LittleEndian>,
    size: U32<LittleEndian>,
    name: [u8; NAME_LEN],
    nareas: U16<LittleEndian>,
}

#[derive(Clone, Copy, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
struct RawArea {
    offset: U32<LittleEndian>,
    size: U32<LittleEndian>,
    name: [u8; NAME_LEN],
    flags: U16<LittleEndian>,
}

/// The encoded length of an FMAP header.
pub const HEADER_LEN: usize = core::mem::size_of::<RawHeader>();

/// The encoded length of an FMAP area descriptor.
pub const AREA_LEN: usize = core::mem::size_of::<RawArea>();

static_assertions::const_assert_eq!(HEADER_LEN, 56);
static_assertions::const_assert_eq!(AREA_LEN, 42);

/// An error returned by an FMAP operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates an error in a low-level [`io`] type.
    Io(io::Error),

    /// Indicates that an error occured in a [`flash`] type.
    Flash(flash::Error),

    /// Indicates that a hash operation failed.
    Hash(hash::Error),

    /// Indicates that no valid FMAP header was found.
    SignatureNotFound,

    /// Indicates that more than one valid FMAP header was found, so which one
    /// is authoritative is ambiguous.
    MultipleSignaturesFound,

    /// Indicates that no area has the requested name or index.
    NotFound,

    /// Indicates that data to be written does not fit in the target area.
    AreaTooSmall {
        /// The length of the data.
        len: usize,
        /// The size of the area.
        size: u32,
    },
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

impl From<hash::Error> for Error {
    fn from(e: hash::Error) -> Self {
        Self::Hash(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "fmap: {}", e),
            Error::Flash(e) => write!(f, "fmap: {}", e),
            Error::Hash(e) => write!(f, "fmap: {}", e),
            Error::SignatureNotFound => write!(f, "cannot find FMAP signature"),
            Error::MultipleSignaturesFound => {
                write!(f, "found multiple FMAP signatures")
            }
            Error::NotFound => write!(f, "FMAP area not found"),
            Error::AreaTooSmall { len, size } => write!(
                f,
                "data of {} bytes does not fit in area of {} bytes",
                len, size
            ),
        }
    }
}

/// A known FMAP area flag.
#[bitflags]
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AreaFlag {
    /// The area's contents do not change between builds.
    Static = 1 << 0,
    /// The area is compressed.
    Compressed = 1 << 1,
    /// The area should not be written to.
    ReadOnly = 1 << 2,
}

impl AreaFlag {
    /// Returns the conventional upper-case name for this flag.
    pub fn name(self) -> &'static str {
        match self {
            Self::Static => "STATIC",
            Self::Compressed => "COMPRESSED",
            Self::ReadOnly => "READ_ONLY",
        }
    }
}

/// Formats a raw flags word as `|`-separated flag names.
///
/// Unknown bits are appended as a single hex value, so that, for example,
/// `0x1013` becomes `"STATIC|COMPRESSED|0x1010"`.
pub fn flag_names(flags: u16) -> String {
    let known = BitFlags::<AreaFlag>::from_bits_truncate(flags);
    let mut names = known.iter().map(|f| f.name().to_string()).collect::<Vec<_>>();
    let rest = flags & !known.bits();
    if rest != 0 {
        names.push(format!("{:#x}", rest));
    }
    names.join("|")
}

/// The FMAP header, minus its signature and area count.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Header {
    /// The major version; always [`VERSION_MAJOR`] after decoding.
    pub ver_major: u8,
    /// The minor version.
    pub ver_minor: u8,
    /// The physical address the flash is mapped at.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::serde::se_hex"))]
    pub base: u64,
    /// The total size of the flash, in bytes.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::serde::se_hex"))]
    pub size: u32,
    /// The raw, NUL-padded name of the flash.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::serde::se_cstr"))]
    pub name: [u8; NAME_LEN],
}

impl Header {
    /// Returns the name, without its padding.
    pub fn name(&self) -> String {
        crate::cstr_lossy(&self.name)
    }
}

/// A single FMAP area.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Area {
    /// The offset of the area from the start of the flash.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::serde::se_hex"))]
    pub offset: u32,
    /// The size of the area, in bytes.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::serde::se_hex"))]
    pub size: u32,
    /// The raw, NUL-padded name of the area.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::serde::se_cstr"))]
    pub name: [u8; NAME_LEN],
    /// The raw flags word; see [`AreaFlag`].
    pub flags: u16,
}

impl Area {
    /// Returns the name, without its padding.
    pub fn name(&self) -> String {
        crate::cstr_lossy(&self.name)
    }

    /// Returns the known flags set on this area.
    pub fn known_flags(&self) -> BitFlags<AreaFlag> {
        BitFlags::from_bits_truncate(self.flags)
    }

    /// Returns the region of flash this area covers.
    pub fn region(&self) -> Region {
        Region::new(self.offset, self.size)
    }
}

/// Where an FMAP was found.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Metadata {
    /// The offset of the signature from the start of the scanned blob.
    pub start: usize,
}

/// A decoded flash area map.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Fmap {
    /// The map's header.
    pub header: Header,
    /// The map's areas, in table order.
    pub areas: Vec<Area>,
}

/// Checks the sanity conditions on a candidate header.
fn is_valid(raw: &RawHeader) -> bool {
    raw.ver_major == VERSION_MAJOR
        && raw.size.get() != 0
        && raw.name.contains(&0)
}

impl Fmap {
    /// Locates and decodes the unique FMAP in `blob`.
    ///
    /// Every occurrence of [`SIGNATURE`] is considered; candidates whose
    /// header is truncated, has the wrong major version, a zero size or an
    /// unterminated name are skipped. Exactly one candidate must remain.
    pub fn locate(blob: &[u8]) -> Result<(Self, Metadata), Error> {
        let mut found = None;
        let candidates = blob
            .windows(SIGNATURE.len())
            .enumerate()
            .filter(|(_, w)| w == SIGNATURE)
            .map(|(i, _)| i);
        for start in candidates {
            let raw = match LayoutVerified::<_, RawHeader>::new_unaligned_from_prefix(
                &blob[start..],
            ) {
                Some((raw, _)) => raw,
                None => continue,
            };
            if !is_valid(&raw) {
                trace!("rejecting FMAP candidate at {:#x}", start);
                continue;
            }
            if found.is_some() {
                return fail!(Error::MultipleSignaturesFound);
            }
            found = Some(start);
        }

        let start = match found {
            Some(s) => s,
            None => return fail!(Error::SignatureNotFound),
        };
        let fmap = Self::decode(&blob[start..])?;
        Ok((fmap, Metadata { start }))
    }

    /// Locates and decodes the unique FMAP on `flash`.
    pub fn read(flash: &(impl Flash + ?Sized)) -> Result<(Self, Metadata), Error> {
        let blob = flash.read_all()?;
        Self::locate(&blob)
    }

    /// Decodes an FMAP that starts exactly at the beginning of `buf`.
    ///
    /// Unlike [`Fmap::locate()`], this does not reject headers that fail the
    /// sanity checks, beyond requiring the signature.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let (raw, mut rest) =
            LayoutVerified::<_, RawHeader>::new_unaligned_from_prefix(buf)
                .ok_or(Error::Io(io::Error::BufferExhausted))?;
        check!(&raw.signature == SIGNATURE, Error::SignatureNotFound);

        let nareas = raw.nareas.get() as usize;
        let mut areas = Vec::with_capacity(nareas.min(rest.len() / AREA_LEN));
        for _ in 0..nareas {
            let (area, r) =
                LayoutVerified::<_, RawArea>::new_unaligned_from_prefix(rest)
                    .ok_or(Error::Io(io::Error::BufferExhausted))?;
            areas.push(Area {
                offset: area.offset.get(),
                size: area.size.get(),
                name: area.name,
                flags: area.flags.get(),
            });
            rest = r;
        }

        Ok(Self {
            header: Header {
                ver_major: raw.ver_major,
                ver_minor: raw.ver_minor,
                base: raw.base.get(),
                size: raw.size.get(),
                name: raw.name,
            },
            areas,
        })
    }

    /// Returns the encoded length of this map.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.areas.len() * AREA_LEN
    }

    /// Encodes the header and area table into `w`.
    ///
    /// The area count is derived from `self.areas`; areas past `u16::MAX`
    /// are dropped, which no real map comes close to.
    pub fn encode(&self, mut w: impl io::Write) -> Result<(), Error> {
        let nareas = self.areas.len().min(u16::MAX as usize);
        let raw = RawHeader {
            signature: *SIGNATURE,
            ver_major: self.header.ver_major,
            ver_minor: self.header.ver_minor,
            base: U64::new(self.header.base),
            size: U32::new(self.header.size),
            name: self.header.name,
            nareas: U16::new(nareas as u16),
        };
        w.write_bytes(raw.as_bytes())?;
        for area in &self.areas[..nareas] {
            let raw = RawArea {
                offset: U32::new(area.offset),
                size: U32::new(area.size),
                name: area.name,
                flags: U16::new(area.flags),
            };
            w.write_bytes(raw.as_bytes())?;
        }
        Ok(())
    }

    /// Overwrites the map found at `meta` with the current contents of
    /// `self`.
    ///
    /// The map is neither relocated nor resized in any other way; adding
    /// areas will overwrite whatever follows the table.
    pub fn write_back(
        &self,
        flash: &mut (impl Flash + ?Sized),
        meta: Metadata,
    ) -> Result<(), Error> {
        let start = u32::try_from(meta.start)
            .map_err(|_| Error::Flash(flash::Error::OutOfRange))?;
        let size = flash.size()?;
        let fits = u32::try_from(self.encoded_len())
            .ok()
            .and_then(|len| start.checked_add(len))
            .map_or(false, |end| end <= size);
        check!(fits, Error::Flash(flash::Error::OutOfRange));

        self.encode(FlashIo::new(&mut *flash, start))?;
        flash.flush()?;
        Ok(())
    }

    /// Returns the index of the first area called `name`.
    pub fn area_index_by_name(&self, name: &str) -> Result<usize, Error> {
        match self.areas.iter().position(|a| a.name() == name) {
            Some(i) => Ok(i),
            None => fail!(Error::NotFound),
        }
    }

    /// Returns the first area called `name`.
    pub fn area_by_name(&self, name: &str) -> Result<&Area, Error> {
        let idx = self.area_index_by_name(name)?;
        Ok(&self.areas[idx])
    }

    fn area(&self, index: usize) -> Result<&Area, Error> {
        match self.areas.get(index) {
            Some(a) => Ok(a),
            None => fail!(Error::NotFound),
        }
    }

    /// Returns a view of `flash` restricted to the area at `index`.
    ///
    /// Offsets on the returned device are relative to the start of the area.
    pub fn area_flash<F: Flash>(
        &self,
        flash: F,
        index: usize,
    ) -> Result<SubFlash<F>, Error> {
        let region = self.area(index)?.region();
        let size = flash.size()?;
        check!(
            region.end().map_or(false, |end| end <= size),
            Error::Flash(flash::Error::OutOfRange)
        );
        Ok(SubFlash(flash, region))
    }

    /// Reads the contents of the area at `index`.
    pub fn read_area(
        &self,
        flash: &(impl Flash + ?Sized),
        index: usize,
    ) -> Result<Vec<u8>, Error> {
        Ok(self.area_flash(flash, index)?.read_all()?)
    }

    /// Reads the contents of the area called `name`.
    pub fn read_area_by_name(
        &self,
        flash: &(impl Flash + ?Sized),
        name: &str,
    ) -> Result<Vec<u8>, Error> {
        self.read_area(flash, self.area_index_by_name(name)?)
    }

    /// Writes `data` to the start of the area at `index`.
    ///
    /// Fails if `data` is longer than the area; shorter data leaves the tail
    /// of the area untouched.
    pub fn write_area(
        &self,
        flash: &mut (impl Flash + ?Sized),
        index: usize,
        data: &[u8],
    ) -> Result<(), Error> {
        let mut area = self.area_flash(flash, index)?;
        let size = area.size()?;
        check!(
            data.len() <= size as usize,
            Error::AreaTooSmall {
                len: data.len(),
                size,
            }
        );
        area.program(0, data)?;
        area.flush()?;
        Ok(())
    }

    /// Hashes the contents of every `STATIC` area, in table order.
    ///
    /// This digest stays stable across builds that only change the dynamic
    /// parts of an image, such as the VPD or the RW firmware slots.
    pub fn checksum(
        &self,
        flash: &(impl Flash + ?Sized),
        hasher: &mut (impl hash::Engine + ?Sized),
        algo: hash::Algo,
    ) -> Result<Vec<u8>, Error> {
        let mut h = hasher.new_hash(algo)?;
        for area in &self.areas {
            if !area.known_flags().contains(AreaFlag::Static) {
                continue;
            }
            let data = flash.read_region(area.region())?;
            h.write(&data)?;
        }
        Ok(h.finish_to_vec()?)
    }
}

impl fmt::Display for Fmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            "Fmap {:?} v{}.{} base={:#x} size={:#x} areas={}",
            h.name(),
            h.ver_major,
            h.ver_minor,
            h.base,
            h.size,
            self.areas.len(),
        )?;
        for (i, a) in self.areas.iter().enumerate() {
            writeln!(
                f,
                "  {:>3}: {:<24} offset={:#010x} size={:#010x} flags={}",
                i,
                a.name(),
                a.offset,
                a.size,
                flag_names(a.flags),
            )?;
        }
        Ok(())
    }
}
