// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Typed CBFS records.

use core::fmt;
use std::borrow::Cow;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cbfs::compress;
use crate::cbfs::compress::Compression;
use crate::cbfs::compress::Decompress;
use crate::cbfs::master::MasterHeader;
use crate::cbfs::payload::PayloadRecord;
use crate::cbfs::stage::LegacyStageRecord;
use crate::cbfs::stage::StageRecord;
use crate::cbfs::Error;
use crate::cbfs::File;
use crate::cbfs::FileType;
use crate::io;
use crate::wire::WireEnum as _;

/// A decoded CBFS file, keyed by its type.
///
/// Every variant owns its [`File`] envelope. Types with no interesting
/// structure keep their body verbatim in the envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    /// The master header.
    Master {
        /// The file envelope.
        file: File,
        /// The decoded header.
        header: MasterHeader,
    },
    /// A stage with a little-endian sub-header.
    LegacyStage(LegacyStageRecord),
    /// A stage described by attributes.
    Stage(StageRecord),
    /// A SELF payload.
    Payload(PayloadRecord),
    /// Free space. The body is always erased (`0xff`) bytes.
    Empty(File),
    /// The bootblock.
    BootBlock(File),
    /// Raw data, or a type with no further structure (such as an FSP-less
    /// EFI blob or a nested FIT).
    Raw(File),
    /// CMOS defaults.
    Cmos(File),
    /// The CMOS option table layout.
    CmosLayout(File),
    /// CPU microcode.
    Microcode(File),
    /// An Intel FSP binary.
    Fsp(File),
    /// Serial presence detect data.
    Spd(File),
    /// A boot splash image.
    BootSplash(File),
    /// A PCI option ROM.
    OptionRom(File),
    /// A file of unknown type. Its body is replaced by erased bytes.
    Unknown(File),
}

/// Replaces a file's body with erased flash.
fn erased(mut file: File) -> File {
    file.data = vec![0xff; file.data.len()];
    file
}

impl Record {
    /// Decodes a record from its file envelope, dispatching on the type.
    ///
    /// Unknown types are not an error; they decode as [`Record::Unknown`].
    pub fn decode(file: File) -> Result<Self, Error> {
        let ty = match file.file_type() {
            Some(ty) => ty,
            None => {
                warn!(
                    "unknown CBFS file type {:#x} for {:?}",
                    file.ty,
                    file.name()
                );
                return Ok(Self::Unknown(erased(file)));
            }
        };

        Ok(match ty {
            FileType::Deleted | FileType::Deleted2 => Self::Empty(erased(file)),
            FileType::Master => {
                let header = MasterHeader::decode(&file.data)?;
                Self::Master { file, header }
            }
            FileType::LegacyStage => {
                Self::LegacyStage(LegacyStageRecord::decode(file)?)
            }
            FileType::Stage => Self::Stage(StageRecord::decode(file)),
            FileType::SelfPayload => Self::Payload(PayloadRecord::decode(file)?),
            FileType::BootBlock => Self::BootBlock(file),
            FileType::Cmos => Self::Cmos(file),
            FileType::CmosLayout => Self::CmosLayout(file),
            FileType::Microcode => Self::Microcode(file),
            FileType::Fsp => Self::Fsp(file),
            FileType::Spd => Self::Spd(file),
            FileType::BootSplash => Self::BootSplash(file),
            FileType::OptionRom => Self::OptionRom(file),
            FileType::Raw
            | FileType::Fit
            | FileType::Vsa
            | FileType::Mbi
            | FileType::Mrc
            | FileType::Mma
            | FileType::Efi
            | FileType::Struct
            | FileType::MrcCache => Self::Raw(file),
        })
    }

    /// Returns the file envelope.
    pub fn file(&self) -> &File {
        match self {
            Self::Master { file, .. } => file,
            Self::LegacyStage(s) => &s.file,
            Self::Stage(s) => &s.file,
            Self::Payload(p) => &p.file,
            Self::Empty(file)
            | Self::BootBlock(file)
            | Self::Raw(file)
            | Self::Cmos(file)
            | Self::CmosLayout(file)
            | Self::Microcode(file)
            | Self::Fsp(file)
            | Self::Spd(file)
            | Self::BootSplash(file)
            | Self::OptionRom(file)
            | Self::Unknown(file) => file,
        }
    }

    /// Returns the file envelope, mutably.
    pub fn file_mut(&mut self) -> &mut File {
        match self {
            Self::Master { file, .. } => file,
            Self::LegacyStage(s) => &mut s.file,
            Self::Stage(s) => &mut s.file,
            Self::Payload(p) => &mut p.file,
            Self::Empty(file)
            | Self::BootBlock(file)
            | Self::Raw(file)
            | Self::Cmos(file)
            | Self::CmosLayout(file)
            | Self::Microcode(file)
            | Self::Fsp(file)
            | Self::Spd(file)
            | Self::BootSplash(file)
            | Self::OptionRom(file)
            | Self::Unknown(file) => file,
        }
    }

    /// Returns the file name.
    pub fn name(&self) -> String {
        self.file().name()
    }

    /// Returns the offset of the record within the `COREBOOT` area.
    pub fn record_start(&self) -> u32 {
        self.file().record_start
    }

    /// Returns whether this record marks free space.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    /// Re-encodes the body from the decoded fields.
    fn body(&self) -> Result<Cow<'_, [u8]>, Error> {
        let mut buf = Vec::new();
        match self {
            Self::Master { header, .. } => header.encode(&mut buf)?,
            Self::LegacyStage(s) => s.encode_body(&mut buf)?,
            Self::Payload(p) => p.encode_body(&mut buf)?,
            other => return Ok(Cow::Borrowed(&other.file().data)),
        }
        Ok(Cow::Owned(buf))
    }

    /// Returns the length of the encoded record.
    pub fn encoded_len(&self) -> Result<usize, Error> {
        Ok(self.file().encoded_len_with(self.body()?.len()))
    }

    /// Encodes the whole record: header, name, attributes and body.
    pub fn encode(&self, w: impl io::Write) -> Result<(), Error> {
        let body = self.body()?;
        self.file().encode_with(&body, w)
    }

    /// Returns the raw compression algorithm of the body, if recorded.
    ///
    /// Legacy stages carry it in their sub-header; everything else uses the
    /// compression attribute.
    pub fn compression(&self) -> Option<u32> {
        match self {
            Self::LegacyStage(s) => Some(s.header.compression),
            other => other.file().compression().map(|c| c.algo),
        }
    }

    /// Returns the decompressed contents of this record.
    ///
    /// For legacy stages this is the code after the sub-header; for every
    /// other record it is the whole body.
    pub fn decompress(
        &self,
        engine: &mut (impl Decompress + ?Sized),
    ) -> Result<Vec<u8>, Error> {
        let data = match self {
            Self::LegacyStage(s) => &s.code[..],
            other => &other.file().data[..],
        };
        let algo = match self.compression() {
            Some(algo) => algo,
            None => return Ok(data.to_vec()),
        };
        match Compression::from_wire_value(algo) {
            None => fail!(Error::UnsupportedCompression(algo)),
            Some(Compression::None) => Ok(data.to_vec()),
            Some(c) => match engine.decompress(c, data) {
                Ok(out) => Ok(out),
                Err(_) => fail!(Error::Decompress),
            },
        }
    }

    /// Returns a structured summary of this record for listings.
    pub fn summary(&self) -> Summary {
        let file = self.file();
        Summary {
            name: file.name(),
            offset: file.record_start,
            file_type: file.type_name(),
            size: file.data.len(),
            compression: compress::describe(self.compression()),
        }
    }
}

/// A one-line description of a record, as shown in listings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Summary {
    /// The file name.
    pub name: String,
    /// The offset of the record within the `COREBOOT` area.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::serde::se_hex"))]
    pub offset: u32,
    /// The name of the file type.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub file_type: String,
    /// The length of the body.
    pub size: usize,
    /// The name of the compression algorithm.
    pub compression: String,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = if self.name.is_empty() {
            "(empty)"
        } else {
            self.name.as_str()
        };
        write!(
            f,
            "{:<30} {:<10} {:<12} {:>8} {}",
            name,
            format!("{:#x}", self.offset),
            self.file_type,
            self.size,
            self.compression,
        )
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.summary().fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cbfs::compress::DecompressError;
    use crate::cbfs::CompressionAttr;
    use pretty_assertions::assert_eq;
    use testutil::data::coreboot;

    fn record(ty: u32, name: &str, attrs: &[u8], data: &[u8]) -> Record {
        let mut area = Vec::new();
        coreboot::push_file(&mut area, ty, name, attrs, data);
        Record::decode(File::decode(&area, 0).unwrap().unwrap()).unwrap()
    }

    /// Pretends to decompress by repeating every byte twice.
    struct Doubler;
    impl Decompress for Doubler {
        fn decompress(
            &mut self,
            algo: Compression,
            data: &[u8],
        ) -> Result<Vec<u8>, DecompressError> {
            if algo != Compression::Lzma {
                return Err(DecompressError);
            }
            Ok(data.iter().flat_map(|&b| vec![b, b]).collect())
        }
    }

    #[test]
    fn dispatch() {
        assert!(matches!(record(0x50, "a", &[], b"x"), Record::Raw(_)));
        assert!(matches!(record(0x63, "a", &[], b"x"), Record::Raw(_)));
        assert!(matches!(record(0x53, "a", &[], b"x"), Record::Microcode(_)));
        assert!(matches!(record(0xab, "a", &[], b"x"), Record::Spd(_)));
        assert!(matches!(record(0x0, "", &[], b"x"), Record::Empty(_)));
        assert!(matches!(record(0xffffffff, "", &[], b"x"), Record::Empty(_)));
        assert!(matches!(record(0x01, "bb", &[], b"x"), Record::BootBlock(_)));
    }

    #[test]
    fn unknown_and_empty_are_erased() {
        let r = record(0x1234, "mystery", &[], b"secret");
        assert!(matches!(r, Record::Unknown(_)));
        assert_eq!(r.file().data, vec![0xff; 6]);
        assert_eq!(r.summary().file_type, "0x1234");

        let r = record(0x0, "", &[], b"junk");
        assert!(r.is_empty());
        assert_eq!(r.file().data, vec![0xff; 4]);
    }

    #[test]
    fn encode_round_trip() {
        let mut area = Vec::new();
        coreboot::push_file(
            &mut area,
            0x50,
            "config",
            &coreboot::compression_attr(0, 5),
            b"hello",
        );
        let file = File::decode(&area, 0).unwrap().unwrap();
        let r = Record::decode(file).unwrap();
        assert_eq!(r.encoded_len().unwrap(), area.len());

        let mut out = Vec::new();
        r.encode(&mut out).unwrap();
        assert_eq!(out, area);
    }

    #[test]
    fn bad_master_header() {
        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x02, "cbfs master header", &[], &[0; 32]);
        let file = File::decode(&area, 0).unwrap().unwrap();
        assert_eq!(Record::decode(file), Err(Error::BadMagic));
    }

    #[test]
    fn decompression() {
        let plain = record(0x50, "a", &coreboot::compression_attr(0, 3), b"abc");
        assert_eq!(plain.decompress(&mut Doubler).unwrap(), b"abc");
        assert_eq!(plain.compression(), Some(0));

        let none = record(0x50, "a", &[], b"abc");
        assert_eq!(none.compression(), None);
        assert_eq!(none.decompress(&mut Doubler).unwrap(), b"abc");

        let lzma = record(0x50, "a", &coreboot::compression_attr(1, 6), b"abc");
        assert_eq!(
            lzma.file().compression(),
            Some(CompressionAttr {
                algo: 1,
                decompressed_size: 6,
            })
        );
        assert_eq!(lzma.decompress(&mut Doubler).unwrap(), b"aabbcc");

        let lz4 = record(0x50, "a", &coreboot::compression_attr(2, 6), b"abc");
        assert_eq!(lz4.decompress(&mut Doubler), Err(Error::Decompress));

        let bogus = record(0x50, "a", &coreboot::compression_attr(9, 6), b"abc");
        assert_eq!(
            bogus.decompress(&mut Doubler),
            Err(Error::UnsupportedCompression(9))
        );
    }

    #[test]
    fn listing_line() {
        let r = record(0x50, "config", &coreboot::compression_attr(1, 9), b"abc");
        let line = r.to_string();
        assert!(line.starts_with("config "));
        assert!(line.contains(" 0x0 "));
        assert!(line.contains(" raw "));
        assert!(line.ends_with(" 3 LZMA"));

        let r = record(0x0, "", &[], b"abc");
        assert!(r.to_string().starts_with("(empty) "));
    }
}
