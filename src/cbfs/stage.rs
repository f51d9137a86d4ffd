// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Stages: executable code loaded by the previous boot stage.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cbfs::file::AttributeTag;
use crate::cbfs::Error;
use crate::cbfs::File;
use crate::io;
use crate::io::Read as _;

/// The length of a legacy stage sub-header.
pub const LEGACY_STAGE_HEADER_LEN: usize = 28;

/// The sub-header at the start of a legacy stage's body.
///
/// Unlike every other CBFS structure, this one is little-endian.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LegacyStageHeader {
    /// The raw compression algorithm of the code.
    pub compression: u32,
    /// The entry point.
    pub entry: u64,
    /// The load address.
    pub load: u64,
    /// The length of the (compressed) code.
    pub len: u32,
    /// The length of the stage in memory.
    pub mem_len: u32,
}

/// A legacy stage file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyStageRecord {
    /// The file envelope.
    pub file: File,
    /// The stage sub-header.
    pub header: LegacyStageHeader,
    /// The code following the sub-header.
    pub code: Vec<u8>,
}

impl LegacyStageRecord {
    /// Decodes a legacy stage from its file.
    pub fn decode(file: File) -> Result<Self, Error> {
        let mut r = &file.data[..];
        let header = LegacyStageHeader {
            compression: r.read_le()?,
            entry: r.read_le()?,
            load: r.read_le()?,
            len: r.read_le()?,
            mem_len: r.read_le()?,
        };
        if header.len as usize != r.len() {
            trace!(
                "legacy stage {:?} declares {} code bytes, has {}",
                file.name(),
                header.len,
                r.len()
            );
        }
        let code = r.to_vec();
        Ok(Self { file, header, code })
    }

    /// Encodes the file body.
    pub fn encode_body(&self, mut w: impl io::Write) -> Result<(), Error> {
        w.write_le(self.header.compression)?;
        w.write_le(self.header.entry)?;
        w.write_le(self.header.load)?;
        w.write_le(self.header.len)?;
        w.write_le(self.header.mem_len)?;
        w.write_bytes(&self.code)?;
        Ok(())
    }
}

/// The stage header attribute of a new-style stage.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StageHeader {
    /// The load address.
    pub load: u64,
    /// The entry point, relative to `load`.
    pub entry_offset: u32,
    /// The length of the stage in memory.
    pub mem_len: u32,
}

impl StageHeader {
    fn decode(mut data: &[u8]) -> Result<Self, io::Error> {
        Ok(Self {
            load: data.read_be()?,
            entry_offset: data.read_be()?,
            mem_len: data.read_be()?,
        })
    }
}

/// A stage file, whose load information lives in its attributes.
///
/// The body is the (possibly compressed) code, and is kept in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageRecord {
    /// The file envelope.
    pub file: File,
    /// The stage header attribute, if present and well-formed.
    pub header: Option<StageHeader>,
}

impl StageRecord {
    /// Decodes a stage from its file.
    pub fn decode(file: File) -> Self {
        let header = file
            .attribute(AttributeTag::StageHeader)
            .and_then(|a| StageHeader::decode(a.data).ok());
        if header.is_none() {
            warn!("stage {:?} has no usable stage header", file.name());
        }
        Self { file, header }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use testutil::data::coreboot;

    #[test]
    fn legacy_round_trip() {
        let mut body = Vec::new();
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&0xfffe_1000u64.to_le_bytes());
        body.extend_from_slice(&0xfffe_0000u64.to_le_bytes());
        body.extend_from_slice(&3u32.to_le_bytes());
        body.extend_from_slice(&0x40u32.to_le_bytes());
        body.extend_from_slice(b"abc");

        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x10, "romstage", &[], &body);
        let file = File::decode(&area, 0).unwrap().unwrap();
        let stage = LegacyStageRecord::decode(file).unwrap();
        assert_eq!(
            stage.header,
            LegacyStageHeader {
                compression: 1,
                entry: 0xfffe_1000,
                load: 0xfffe_0000,
                len: 3,
                mem_len: 0x40,
            }
        );
        assert_eq!(stage.code, b"abc");

        let mut out = Vec::new();
        stage.encode_body(&mut out).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn legacy_too_short() {
        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x10, "romstage", &[], &[0; 20]);
        let file = File::decode(&area, 0).unwrap().unwrap();
        assert_eq!(
            LegacyStageRecord::decode(file),
            Err(Error::Io(io::Error::BufferExhausted))
        );
    }

    #[test]
    fn stage_attribute() {
        let mut area = Vec::new();
        coreboot::push_file(
            &mut area,
            0x11,
            "ramstage",
            &coreboot::stage_attr(0x100000, 0x20, 0x4000),
            b"code",
        );
        let file = File::decode(&area, 0).unwrap().unwrap();
        let stage = StageRecord::decode(file);
        assert_eq!(
            stage.header,
            Some(StageHeader {
                load: 0x100000,
                entry_offset: 0x20,
                mem_len: 0x4000,
            })
        );

        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x11, "ramstage", &[], b"code");
        let file = File::decode(&area, 0).unwrap().unwrap();
        assert_eq!(StageRecord::decode(file).header, None);
    }
}
