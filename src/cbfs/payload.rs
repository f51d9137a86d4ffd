// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Payloads in the "simple ELF" (SELF) format.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cbfs::Error;
use crate::cbfs::File;
use crate::io;
use crate::io::Read as _;
use crate::wire::WireEnum as _;

/// The encoded length of a segment header.
pub const SEGMENT_LEN: usize = 28;

wire_enum! {
    /// A SELF segment type, stored as four ASCII characters.
    #[cfg_attr(feature = "serde", derive(Serialize))]
    pub enum SegmentType: u32 {
        /// Code (`"CODE"`).
        Code = 0x434f4445,
        /// Initialized data (`"DATA"`).
        Data = 0x44415441,
        /// Zero-initialized memory (`" BSS"`).
        Bss = 0x20425353,
        /// Parameters (`"PARA"`).
        Params = 0x50415241,
        /// The entry point; terminates the segment list (`"ENTR"`).
        Entry = 0x454e5452,
    }
}

/// A SELF segment header.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Segment {
    /// The raw segment type; see [`SegmentType`].
    pub ty: u32,
    /// The raw compression algorithm of the segment's bytes.
    pub compression: u32,
    /// The offset of the segment's bytes from the start of the file body.
    pub offset: u32,
    /// The load address (or entry point, for [`SegmentType::Entry`]).
    pub load: u64,
    /// The length of the segment's bytes in the file.
    pub len: u32,
    /// The length of the segment in memory.
    pub mem_len: u32,
}

impl Segment {
    /// Returns the segment type, if it is a known one.
    pub fn segment_type(&self) -> Option<SegmentType> {
        SegmentType::from_wire_value(self.ty)
    }
}

/// A SELF payload file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadRecord {
    /// The file envelope.
    pub file: File,
    /// The segment headers, including the terminating entry segment.
    pub segments: Vec<Segment>,
    /// The bytes following the segment headers.
    pub body: Vec<u8>,
}

impl PayloadRecord {
    /// Decodes a payload from its file.
    ///
    /// The segment list must be terminated by an entry segment.
    pub fn decode(file: File) -> Result<Self, Error> {
        let mut r = &file.data[..];
        let mut segments = Vec::new();
        loop {
            let segment = Segment {
                ty: r.read_be()?,
                compression: r.read_be()?,
                offset: r.read_be()?,
                load: r.read_be()?,
                len: r.read_be()?,
                mem_len: r.read_be()?,
            };
            let last = segment.segment_type() == Some(SegmentType::Entry);
            segments.push(segment);
            if last {
                break;
            }
        }

        if r.is_empty() {
            trace!("payload {:?} has no body after its segments", file.name());
        }
        let body = r.to_vec();
        Ok(Self {
            file,
            segments,
            body,
        })
    }

    /// Encodes the file body.
    pub fn encode_body(&self, mut w: impl io::Write) -> Result<(), Error> {
        for s in &self.segments {
            w.write_be(s.ty)?;
            w.write_be(s.compression)?;
            w.write_be(s.offset)?;
            w.write_be(s.load)?;
            w.write_be(s.len)?;
            w.write_be(s.mem_len)?;
        }
        w.write_bytes(&self.body)?;
        Ok(())
    }

    /// Returns the entry point, if the segment list has one.
    pub fn entry_point(&self) -> Option<u64> {
        self.segments
            .iter()
            .find(|s| s.segment_type() == Some(SegmentType::Entry))
            .map(|s| s.load)
    }

    /// Returns the file bytes backing the segment at `index`.
    pub fn segment_bytes(&self, index: usize) -> Result<&[u8], Error> {
        let segment = match self.segments.get(index) {
            Some(s) => s,
            None => return fail!(Error::NotFound),
        };
        crate::cbfs::slice(
            &self.file.data,
            segment.offset as usize,
            segment.len as usize,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use testutil::bytes::*;
    use testutil::data::coreboot;

    fn segment(buf: &mut Vec<u8>, ty: &[u8; 4], offset: u32, load: u64, len: u32) {
        buf.extend_from_slice(ty);
        be32(buf, 0);
        be32(buf, offset);
        be64(buf, load);
        be32(buf, len);
        be32(buf, len);
    }

    fn decode(body: &[u8]) -> Result<PayloadRecord, Error> {
        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x20, "payload", &[], body);
        PayloadRecord::decode(File::decode(&area, 0).unwrap().unwrap())
    }

    #[test]
    fn segments_and_body() {
        let mut body = Vec::new();
        segment(&mut body, b"CODE", 2 * 28, 0x10000, 4);
        segment(&mut body, b"ENTR", 0, 0x10010, 0);
        body.extend_from_slice(b"\x90\x90\xeb\xfe");

        let payload = decode(&body).unwrap();
        assert_eq!(payload.segments.len(), 2);
        assert_eq!(
            payload.segments[0].segment_type(),
            Some(SegmentType::Code)
        );
        assert_eq!(payload.entry_point(), Some(0x10010));
        assert_eq!(payload.body, b"\x90\x90\xeb\xfe");
        assert_eq!(payload.segment_bytes(0).unwrap(), b"\x90\x90\xeb\xfe");
        assert_eq!(payload.segment_bytes(5), Err(Error::NotFound));

        let mut out = Vec::new();
        payload.encode_body(&mut out).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn empty_body_is_tolerated() {
        let mut body = Vec::new();
        segment(&mut body, b"ENTR", 0, 0x10010, 0);
        let payload = decode(&body).unwrap();
        assert!(payload.body.is_empty());
    }

    #[test]
    fn unterminated_segment_list() {
        let mut body = Vec::new();
        segment(&mut body, b"CODE", 0, 0x10000, 4);
        segment(&mut body, b"DATA", 0, 0x20000, 4);
        assert_eq!(decode(&body), Err(Error::Io(io::Error::BufferExhausted)));
    }
}
