// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The CBFS file envelope: header, name, attributes and body.

use zerocopy::byteorder::BigEndian;
use zerocopy::byteorder::U32;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::LayoutVerified;
use zerocopy::Unaligned;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cbfs::compress::Compression;
use crate::cbfs::slice;
use crate::cbfs::Error;
use crate::io;
use crate::io::Read as _;
use crate::wire::WireEnum as _;

/// The magic number at the start of every file header.
pub const FILE_MAGIC: &[u8; 8] = b"LARCHIVE";

/// The alignment of every file within the CBFS.
pub const ALIGNMENT: usize = 16;

#[derive(Clone, Copy, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
struct RawFileHeader {
    magic: [u8; 8],
    size: U32<BigEndian>,
    ty: U32<BigEndian>,
    attr_offset: U32<BigEndian>,
    sub_header_offset: U32<BigEndian>,
}

/// The length of the fixed part of a file header.
pub const FILE_HEADER_LEN: usize = core::mem::size_of::<RawFileHeader>();
static_assertions::const_assert_eq!(FILE_HEADER_LEN, 24);

/// The name region length used for synthesized empty files.
const EMPTY_NAME_LEN: usize = 16;

wire_enum! {
    /// A CBFS file type.
    #[cfg_attr(feature = "serde", derive(Serialize))]
    pub enum FileType: u32 {
        /// A deleted file, or free space.
        Deleted = 0x0,
        /// Free space, as written by newer tools.
        Deleted2 = 0xffffffff,
        /// The bootblock.
        BootBlock = 0x01,
        /// The CBFS master header.
        Master = 0x02,
        /// A stage with a little-endian sub-header in its body.
        LegacyStage = 0x10,
        /// A stage whose header lives in an attribute.
        Stage = 0x11,
        /// A payload in the "simple ELF" format.
        SelfPayload = 0x20,
        /// An Intel FIT.
        Fit = 0x21,
        /// A PCI option ROM.
        OptionRom = 0x30,
        /// A boot splash image.
        BootSplash = 0x40,
        /// Raw data.
        Raw = 0x50,
        /// A VSA image.
        Vsa = 0x51,
        /// An MBI image.
        Mbi = 0x52,
        /// CPU microcode.
        Microcode = 0x53,
        /// An Intel FSP binary.
        Fsp = 0x60,
        /// A memory reference code binary.
        Mrc = 0x61,
        /// A memory margin analysis binary.
        Mma = 0x62,
        /// A UEFI binary.
        Efi = 0x63,
        /// A packed structure.
        Struct = 0x70,
        /// CMOS defaults.
        Cmos = 0xaa,
        /// Serial presence detect data.
        Spd = 0xab,
        /// A memory training cache.
        MrcCache = 0xac,
        /// The CMOS option table layout.
        CmosLayout = 0x1aa,
    }
}

impl FileType {
    /// Returns the name `cbfstool` uses for this type.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Deleted2 => "null",
            Self::BootBlock => "bootblock",
            Self::Master => "cbfs header",
            Self::LegacyStage => "legacy stage",
            Self::Stage => "stage",
            Self::SelfPayload => "simple elf",
            Self::Fit => "fit",
            Self::OptionRom => "optionrom",
            Self::BootSplash => "bootsplash",
            Self::Raw => "raw",
            Self::Vsa => "vsa",
            Self::Mbi => "mbi",
            Self::Microcode => "microcode",
            Self::Fsp => "fsp",
            Self::Mrc => "mrc",
            Self::Mma => "mma",
            Self::Efi => "efi",
            Self::Struct => "struct",
            Self::Cmos => "cmos_default",
            Self::Spd => "spd",
            Self::MrcCache => "mrc_cache",
            Self::CmosLayout => "cmos_layout",
        }
    }
}

wire_enum! {
    /// A tag in a file's attribute chain.
    pub enum AttributeTag: u32 {
        /// Marks the end of the chain.
        Unused = 0x0,
        /// Marks the end of the chain, as left by erased flash.
        Unused2 = 0xffffffff,
        /// Compression information (`"LZCB"`).
        Compression = 0x42435a4c,
        /// A hash of the file body.
        Hash = 0x68736148,
        /// A requested absolute position.
        Position = 0x42435350,
        /// A requested alignment.
        Alignment = 0x42434c41,
        /// Padding.
        Padding = 0x47444150,
        /// Stage load information.
        StageHeader = 0x53746748,
    }
}

/// A single entry in a file's attribute chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// The raw tag.
    pub tag: u32,
    /// The attribute's payload, after the tag and length.
    pub data: &'a [u8],
}

impl Attribute<'_> {
    /// Returns the tag, if it is a known one.
    pub fn known_tag(&self) -> Option<AttributeTag> {
        AttributeTag::from_wire_value(self.tag)
    }
}

/// An iterator over a file's attribute chain.
///
/// Iteration stops at the first unused tag or malformed entry; attributes
/// are advisory, so a broken chain is never an error.
#[derive(Clone)]
pub struct Attributes<'a> {
    buf: &'a [u8],
}

impl<'a> Iterator for Attributes<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Attribute<'a>> {
        let mut r = self.buf;
        let tag = r.read_be::<u32>().ok()?;
        let len = r.read_be::<u32>().ok()? as usize;
        let rest = core::mem::replace(&mut self.buf, &[]);

        if let Some(AttributeTag::Unused) | Some(AttributeTag::Unused2) =
            AttributeTag::from_wire_value(tag)
        {
            return None;
        }
        if len < 8 || len > rest.len() {
            warn!("malformed CBFS attribute {:#x} of length {}", tag, len);
            return None;
        }

        self.buf = &rest[len..];
        Some(Attribute {
            tag,
            data: &rest[8..len],
        })
    }
}

/// The payload of a compression attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompressionAttr {
    /// The raw algorithm identifier.
    pub algo: u32,
    /// The length of the body once decompressed.
    pub decompressed_size: u32,
}

impl CompressionAttr {
    fn decode(mut data: &[u8]) -> Option<Self> {
        Some(Self {
            algo: data.read_be().ok()?,
            decompressed_size: data.read_be().ok()?,
        })
    }

    /// Returns the algorithm, if it is a known one.
    pub fn compression(&self) -> Option<Compression> {
        Compression::from_wire_value(self.algo)
    }
}

/// A CBFS file: the envelope shared by every [`Record`] type.
///
/// Name and attribute regions are kept as raw bytes, padding included, so
/// that re-encoding an unmodified file reproduces it exactly.
///
/// [`Record`]: enum.Record.html
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct File {
    /// The offset of this file from the start of the `COREBOOT` area.
    pub record_start: u32,
    /// The raw file type; see [`FileType`].
    pub ty: u32,
    /// The offset of the attribute chain from `record_start`, or zero if
    /// there is none.
    pub attr_offset: u32,
    /// The offset of the body from `record_start`.
    pub sub_header_offset: u32,
    /// The raw, NUL-padded name region.
    pub name: Vec<u8>,
    /// The raw attribute region.
    pub attrs: Vec<u8>,
    /// The body.
    pub data: Vec<u8>,
}

impl File {
    /// Attempts to decode a file at `offset` in `area`.
    ///
    /// Returns `Ok(None)` if there is no file magic at `offset`. A file whose
    /// regions do not fit inside `area` is an error.
    pub fn decode(area: &[u8], offset: usize) -> Result<Option<Self>, Error> {
        let header = slice(area, offset, FILE_HEADER_LEN)?;
        let raw = match LayoutVerified::<_, RawFileHeader>::new_unaligned(header) {
            Some(raw) => raw,
            None => return fail!(Error::Io(io::Error::Internal)),
        };
        if &raw.magic != FILE_MAGIC {
            return Ok(None);
        }

        let attr_offset = raw.attr_offset.get() as usize;
        let sub_header_offset = raw.sub_header_offset.get() as usize;
        let name_end = if attr_offset != 0 {
            attr_offset
        } else {
            sub_header_offset
        };
        if name_end < FILE_HEADER_LEN || sub_header_offset < name_end {
            return fail!(Error::OutOfBounds {
                start: offset + FILE_HEADER_LEN,
                end: offset.saturating_add(sub_header_offset),
                len: area.len(),
            });
        }

        let name =
            slice(area, offset + FILE_HEADER_LEN, name_end - FILE_HEADER_LEN)?;
        let attrs = slice(area, offset + name_end, sub_header_offset - name_end)?;
        let data = slice(
            area,
            offset + sub_header_offset,
            raw.size.get() as usize,
        )?;

        Ok(Some(Self {
            record_start: offset as u32,
            ty: raw.ty.get(),
            attr_offset: attr_offset as u32,
            sub_header_offset: sub_header_offset as u32,
            name: name.to_vec(),
            attrs: attrs.to_vec(),
            data: data.to_vec(),
        }))
    }

    /// Creates an empty file filling `len` bytes starting at `record_start`,
    /// header included.
    ///
    /// Returns `None` if `len` cannot even hold the header and name.
    pub fn empty(record_start: u32, len: u32) -> Option<Self> {
        let sub_header_offset = (FILE_HEADER_LEN + EMPTY_NAME_LEN) as u32;
        let size = len.checked_sub(sub_header_offset)?;
        Some(Self {
            record_start,
            ty: FileType::Deleted2.to_wire_value(),
            attr_offset: 0,
            sub_header_offset,
            name: vec![0; EMPTY_NAME_LEN],
            attrs: Vec::new(),
            data: vec![0xff; size as usize],
        })
    }

    /// Returns the name, without its padding.
    pub fn name(&self) -> String {
        crate::cstr_lossy(&self.name)
    }

    /// Returns the file type, if it is a known one.
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_wire_value(self.ty)
    }

    /// Returns a human-readable name for the file type.
    pub fn type_name(&self) -> String {
        match self.file_type() {
            Some(t) => t.tool_name().to_string(),
            None => format!("{:#x}", self.ty),
        }
    }

    /// Returns whether this file marks free space.
    ///
    /// Both encodings of "deleted" are accepted.
    pub fn is_empty(&self) -> bool {
        matches!(
            self.file_type(),
            Some(FileType::Deleted) | Some(FileType::Deleted2)
        )
    }

    /// Returns an iterator over the attribute chain.
    pub fn attributes(&self) -> Attributes<'_> {
        Attributes { buf: &self.attrs }
    }

    /// Returns the first attribute with the given tag.
    pub fn attribute(&self, tag: AttributeTag) -> Option<Attribute<'_>> {
        let tag = tag.to_wire_value();
        self.attributes().find(|a| a.tag == tag)
    }

    /// Returns the compression attribute, if there is a well-formed one.
    pub fn compression(&self) -> Option<CompressionAttr> {
        CompressionAttr::decode(self.attribute(AttributeTag::Compression)?.data)
    }

    /// Returns the encoded length of this file given a body of `data_len`
    /// bytes.
    pub fn encoded_len_with(&self, data_len: usize) -> usize {
        FILE_HEADER_LEN + self.name.len() + self.attrs.len() + data_len
    }

    /// Encodes this file's header, name and attributes followed by `data`.
    ///
    /// The offsets are recomputed from the region lengths, and the size from
    /// `data`.
    pub fn encode_with(
        &self,
        data: &[u8],
        mut w: impl io::Write,
    ) -> Result<(), Error> {
        let name_end = FILE_HEADER_LEN + self.name.len();
        let attr_offset = if self.attr_offset != 0 || !self.attrs.is_empty() {
            name_end as u32
        } else {
            0
        };
        let raw = RawFileHeader {
            magic: *FILE_MAGIC,
            size: U32::new(data.len() as u32),
            ty: U32::new(self.ty),
            attr_offset: U32::new(attr_offset),
            sub_header_offset: U32::new((name_end + self.attrs.len()) as u32),
        };
        w.write_bytes(raw.as_bytes())?;
        w.write_bytes(&self.name)?;
        w.write_bytes(&self.attrs)?;
        w.write_bytes(data)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use testutil::data::coreboot;

    #[test]
    fn decode_and_encode() {
        let mut area = Vec::new();
        let mut attrs = coreboot::compression_attr(1, 0x1000);
        attrs.extend(coreboot::stage_attr(0x1000, 0x10, 0x2000));
        coreboot::push_file(&mut area, 0x11, "fallback/ramstage", &attrs, b"code");

        let file = File::decode(&area, 0).unwrap().unwrap();
        assert_eq!(file.name(), "fallback/ramstage");
        assert_eq!(file.file_type(), Some(FileType::Stage));
        assert_eq!(file.type_name(), "stage");
        assert_eq!(file.attr_offset, 48);
        assert_eq!(file.sub_header_offset, 48 + 40);
        assert_eq!(file.data, b"code");
        assert_eq!(
            file.compression(),
            Some(CompressionAttr {
                algo: 1,
                decompressed_size: 0x1000
            })
        );
        assert_eq!(
            file.compression().unwrap().compression(),
            Some(Compression::Lzma)
        );

        let tags = file
            .attributes()
            .map(|a| a.known_tag())
            .collect::<Vec<_>>();
        assert_eq!(
            tags,
            vec![
                Some(AttributeTag::Compression),
                Some(AttributeTag::StageHeader)
            ]
        );

        let mut out = Vec::new();
        file.encode_with(&file.data, &mut out).unwrap();
        assert_eq!(out, area);
    }

    #[test]
    fn no_magic() {
        let area = vec![0xffu8; 64];
        assert_eq!(File::decode(&area, 16), Ok(None));
        assert!(File::decode(&area, 48).is_err());
    }

    #[test]
    fn overlong_body() {
        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x50, "raw", &[], &[1, 2, 3, 4]);
        area.truncate(area.len() - 1);
        assert!(matches!(
            File::decode(&area, 0),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn bad_offsets() {
        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x50, "raw", &[], &[1, 2, 3, 4]);
        // sub_header_offset = 4, inside the fixed header.
        area[20..24].copy_from_slice(&4u32.to_be_bytes());
        assert!(matches!(
            File::decode(&area, 0),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn malformed_compression_chain() {
        let mut attrs = Vec::new();
        // A tag whose length cannot even hold its own header.
        attrs.extend_from_slice(&0x47444150u32.to_be_bytes());
        attrs.extend_from_slice(&4u32.to_be_bytes());
        attrs.extend(coreboot::compression_attr(1, 0x10));
        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x50, "raw", &attrs, b"x");
        let file = File::decode(&area, 0).unwrap().unwrap();
        assert_eq!(file.compression(), None);

        // An unused tag ends the chain before the compression attribute.
        let mut attrs = vec![0u8; 8];
        attrs.extend(coreboot::compression_attr(1, 0x10));
        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x50, "raw", &attrs, b"x");
        let file = File::decode(&area, 0).unwrap().unwrap();
        assert_eq!(file.compression(), None);
        assert_eq!(file.attributes().count(), 0);
    }

    #[test]
    fn synthesized_empty() {
        let file = File::empty(0x100, 0x80).unwrap();
        assert!(file.is_empty());
        assert_eq!(file.data.len(), 0x80 - 0x28);
        assert_eq!(file.encoded_len_with(file.data.len()), 0x80);

        let mut out = Vec::new();
        file.encode_with(&file.data, &mut out).unwrap();
        let back = File::decode(&out, 0).unwrap().unwrap();
        assert_eq!(back.sub_header_offset, 0x28);
        assert_eq!(back.attr_offset, 0);
        assert_eq!(back.data, file.data);
        assert_eq!(File::empty(0, 0x20), None);

        let mut deleted = file.clone();
        deleted.ty = 0;
        assert!(deleted.is_empty());
    }
}
