// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Whole CBFS images.

use core::fmt;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::ser::SerializeStruct as _;
#[cfg(feature = "serde")]
use serde::Serialize;
#[cfg(feature = "serde")]
use serde::Serializer;

use crate::align_up;
use crate::cbfs::slice;
use crate::cbfs::Error;
use crate::cbfs::File;
use crate::cbfs::Record;
use crate::cbfs::ALIGNMENT;
use crate::cbfs::FILE_HEADER_LEN;
use crate::fmap;
use crate::fmap::Area;
use crate::fmap::Fmap;
use crate::io::Cursor;

/// A flash image containing a CBFS.
///
/// The image owns the raw bytes it was decoded from. Mutations, such as
/// [`Image::remove()`], only affect the decoded records until
/// [`Image::update()`] writes them back into the raw bytes.
#[derive(Clone, Debug)]
pub struct Image {
    fmap: Fmap,
    fmap_meta: fmap::Metadata,
    area: Area,
    records: Vec<Record>,
    data: Vec<u8>,
}

/// Walks the records of a `COREBOOT` area.
///
/// Offsets without a file magic are skipped a whole alignment unit at a
/// time.
fn walk(area: &[u8]) -> Result<Vec<Record>, Error> {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset + FILE_HEADER_LEN <= area.len() {
        let file = match File::decode(area, offset)? {
            Some(file) => file,
            None => {
                offset += ALIGNMENT;
                continue;
            }
        };
        let end = offset + file.encoded_len_with(file.data.len());
        trace!(
            "CBFS file {:?} of type {:#x} at {:#x}",
            file.name(),
            file.ty,
            offset
        );
        records.push(Record::decode(file)?);
        offset = match align_up(end, ALIGNMENT) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(records)
}

impl Image {
    /// Decodes the CBFS in `data`, which must be a whole flash image.
    pub fn new(data: Vec<u8>) -> Result<Self, Error> {
        let (fmap, fmap_meta) = Fmap::locate(&data)?;
        let area = match fmap.area_by_name(fmap::COREBOOT_AREA) {
            Ok(area) => area.clone(),
            Err(_) => return fail!(Error::NoCbfsArea),
        };
        let records =
            walk(slice(&data, area.offset as usize, area.size as usize)?)?;
        info!(
            "found {} CBFS records in {:#x} bytes at {:#x}",
            records.len(),
            area.size,
            area.offset
        );
        Ok(Self {
            fmap,
            fmap_meta,
            area,
            records,
            data,
        })
    }

    /// Reads a whole flash image from `r` and decodes its CBFS.
    pub fn from_reader(mut r: impl std::io::Read) -> Result<Self, Error> {
        let mut data = Vec::new();
        if let Err(e) = r.read_to_end(&mut data) {
            return fail!(Error::Host(e.kind()));
        }
        Self::new(data)
    }

    /// Reads the flash image at `path` and decodes its CBFS.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        match std::fs::read(path) {
            Ok(data) => Self::new(data),
            Err(e) => fail!(Error::Host(e.kind())),
        }
    }

    /// Returns the image's FMAP.
    pub fn fmap(&self) -> &Fmap {
        &self.fmap
    }

    /// Returns where the image's FMAP was found.
    pub fn fmap_metadata(&self) -> fmap::Metadata {
        self.fmap_meta
    }

    /// Returns the `COREBOOT` area.
    pub fn area(&self) -> &Area {
        &self.area
    }

    /// Returns the records, in flash order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the records, in flash order, mutably.
    ///
    /// Changing a record's length is only safe as long as it still fits
    /// before the next one; [`Image::update()`] only checks the area bounds.
    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    /// Returns the first record called `name`.
    pub fn find(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name() == name)
    }

    /// Returns the first record called `name`, mutably.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.name() == name)
    }

    /// Returns the raw image bytes.
    ///
    /// These do not reflect changes to the records until
    /// [`Image::update()`] is called.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the image, returning its raw bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Writes the raw image bytes to `w`.
    pub fn write_to(&self, mut w: impl std::io::Write) -> Result<(), Error> {
        match w.write_all(&self.data) {
            Ok(()) => Ok(()),
            Err(e) => fail!(Error::Host(e.kind())),
        }
    }

    /// Removes the record called `name`, replacing it with free space.
    ///
    /// Free space directly before or after the record is merged into the
    /// new empty record, so no other record moves. The master header and a
    /// trailing bootblock cannot be removed.
    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        let idx = match self.records.iter().position(|r| r.name() == name) {
            Some(idx) => idx,
            None => return fail!(Error::NotFound),
        };
        let last_idx = self.records.len() - 1;
        check!(idx != 0, Error::PermissionDenied);
        check!(
            !(idx == last_idx && matches!(self.records[idx], Record::BootBlock(_))),
            Error::PermissionDenied
        );

        let mut first = idx;
        let mut last = idx;
        if self.records[first - 1].is_empty() {
            first -= 1;
        }
        if last < last_idx && self.records[last + 1].is_empty() {
            last += 1;
        }

        let base = self.records[first].record_start();
        let top = match self.records.get(last + 1) {
            Some(next) => next.record_start(),
            None => self.area.size,
        };
        let empty = match top.checked_sub(base).and_then(|len| File::empty(base, len)) {
            Some(file) => file,
            None => {
                return fail!(Error::RegionOutOfBounds {
                    record_start: base,
                    len: top.saturating_sub(base) as usize,
                })
            }
        };
        trace!(
            "replacing records {}..={} with {:#x} free bytes at {:#x}",
            first,
            last,
            top - base,
            base
        );
        self.records
            .splice(first..=last, std::iter::once(Record::Empty(empty)));
        Ok(())
    }

    /// Re-encodes every record into the raw image bytes, at its original
    /// offset.
    ///
    /// The image length and record offsets never change. A record that no
    /// longer fits inside the `COREBOOT` area is an error.
    pub fn update(&mut self) -> Result<(), Error> {
        let area_start = self.area.offset as usize;
        let area_size = self.area.size as usize;
        for record in &self.records {
            let len = record.encoded_len()?;
            let record_start = record.record_start();
            let start = record_start as usize;
            let end = match start.checked_add(len) {
                Some(end) if end <= area_size => end,
                _ => return fail!(Error::RegionOutOfBounds { record_start, len }),
            };

            let dest = &mut self.data[area_start + start..area_start + end];
            let mut cursor = Cursor::new(dest);
            record.encode(&mut cursor)?;
            check!(
                cursor.consumed_len() == len,
                Error::RegionOutOfBounds { record_start, len }
            );
        }
        Ok(())
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "FMAP REGION: {}", self.area.name())?;
        writeln!(
            f,
            "{:<30} {:<10} {:<12} {:>8} {}",
            "Name", "Offset", "Type", "Size", "Comp"
        )?;
        for record in &self.records {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl Serialize for Image {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let summaries = self.records.iter().map(Record::summary).collect::<Vec<_>>();
        let mut st = s.serialize_struct("Image", 3)?;
        st.serialize_field("region", &self.area.name())?;
        st.serialize_field("fmap", &self.fmap_meta)?;
        st.serialize_field("records", &summaries)?;
        st.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use testutil::data::coreboot;

    fn starts(image: &Image) -> Vec<u32> {
        image.records().iter().map(Record::record_start).collect()
    }

    #[test]
    fn open_lists_records() {
        let image = Image::new(coreboot::rom()).unwrap();
        let names = image.records().iter().map(Record::name).collect::<Vec<_>>();
        assert_eq!(names, coreboot::RECORD_NAMES);
        assert_eq!(image.area().name(), "COREBOOT");
        assert_eq!(image.fmap_metadata().start, 0);

        let ramstage = image.find("fallback/ramstage").unwrap();
        assert!(matches!(ramstage, Record::Stage(_)));
        assert_eq!(ramstage.compression(), Some(1));
        assert!(image.to_string().contains("fallback/ramstage"));
        assert!(image.to_string().starts_with("FMAP REGION: COREBOOT\n"));

        let kinds = image
            .records()
            .iter()
            .map(|r| r.summary().file_type)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            &[
                "cbfs header",
                "legacy stage",
                "stage",
                "simple elf",
                "raw",
                "cmos_layout",
                "microcode",
                "0x7777",
                "null",
                "bootblock",
            ]
        );

        match image.find("fallback/payload") {
            Some(Record::Payload(p)) => assert_eq!(p.segments.len(), 3),
            other => panic!("unexpected record {:?}", other),
        }
        match image.find("cbfs master header") {
            Some(Record::Master { header, .. }) => {
                assert_eq!(header.rom_size, coreboot::ROM_SIZE)
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert_eq!(image.find("config").unwrap().file().data, coreboot::CONFIG);
        assert!(image.find("nope").is_none());
    }

    #[test]
    fn update_round_trip() {
        let rom = coreboot::rom();
        let mut image = Image::from_reader(&rom[..]).unwrap();
        image.update().unwrap();
        assert_eq!(image.data(), &rom[..]);

        let mut out = Vec::new();
        image.write_to(&mut out).unwrap();
        assert_eq!(out, rom);
    }

    #[test]
    fn remove_payload() {
        let rom = coreboot::rom();
        let mut image = Image::new(rom.clone()).unwrap();
        let before = starts(&image);

        image.remove("fallback/payload").unwrap();
        assert_eq!(starts(&image), before);
        image.update().unwrap();
        let data = image.into_data();
        assert_eq!(data.len(), rom.len());

        let image = Image::new(data).unwrap();
        assert_eq!(starts(&image), before);
        assert!(image.records()[3].is_empty());
        assert!(image.find("fallback/payload").is_none());
        assert_eq!(image.find("config").unwrap().file().data, coreboot::CONFIG);
    }

    #[test]
    fn remove_merges_free_space() {
        let mut image = Image::new(coreboot::rom()).unwrap();
        let before = starts(&image);
        let bootblock = image.find("bootblock").unwrap().record_start();

        // Followed by free space.
        image.remove("vendor/mystery").unwrap();
        assert_eq!(image.records().len(), 9);
        assert_eq!(image.records()[7].record_start(), before[7]);
        assert_eq!(
            image.records()[7].encoded_len().unwrap() as u32,
            bootblock - before[7]
        );

        // Followed by free space again, after the previous removal.
        image.remove("cpu_microcode_blob.bin").unwrap();
        assert_eq!(image.records().len(), 8);

        // Preceded by free space.
        image.remove("fallback/payload").unwrap();
        image.remove("config").unwrap();
        assert_eq!(image.records().len(), 7);
        assert_eq!(image.records()[3].record_start(), before[3]);
        assert_eq!(image.records()[4].name(), "cmos_layout.bin");
        assert_eq!(image.records()[4].record_start(), before[5]);

        image.update().unwrap();
        let reopened = Image::new(image.into_data()).unwrap();
        let names = reopened
            .records()
            .iter()
            .map(Record::name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            &[
                "cbfs master header",
                "fallback/romstage",
                "fallback/ramstage",
                "",
                "cmos_layout.bin",
                "",
                "bootblock",
            ]
        );
    }

    #[test]
    fn remove_protected_and_missing() {
        let mut image = Image::new(coreboot::rom()).unwrap();
        assert_eq!(
            image.remove("cbfs master header"),
            Err(Error::PermissionDenied)
        );
        assert_eq!(image.remove("bootblock"), Err(Error::PermissionDenied));
        assert_eq!(image.remove("fallback/bootblock"), Err(Error::NotFound));
        assert_eq!(image.records().len(), coreboot::RECORD_NAMES.len());
    }

    #[test]
    fn grown_record_is_out_of_bounds() {
        let mut image = Image::new(coreboot::rom()).unwrap();
        let start = image.find("bootblock").unwrap().record_start();
        let record = image.find_mut("bootblock").unwrap();
        record.file_mut().data.push(0);
        let len = record.encoded_len().unwrap();
        assert_eq!(
            image.update(),
            Err(Error::RegionOutOfBounds {
                record_start: start,
                len,
            })
        );
    }

    #[test]
    fn no_coreboot_area() {
        let mut rom = testutil::data::fmap::encode(
            1,
            0,
            0x1000,
            "FLASH",
            &[(0, 0x1000, "FMAP", 0x1)],
        );
        rom.resize(0x1000, 0xff);
        assert_eq!(Image::new(rom).err(), Some(Error::NoCbfsArea));

        assert_eq!(
            Image::new(vec![0xff; 0x1000]).err(),
            Some(Error::Fmap(fmap::Error::SignatureNotFound))
        );
    }

    #[test]
    fn junk_between_records() {
        let mut area = Vec::new();
        coreboot::push_file(&mut area, 0x50, "a", &[], b"first");
        coreboot::push_file(&mut area, 0x50, "b", &[], b"second");
        testutil::bytes::align(&mut area, 16, 0xff);
        area.extend_from_slice(&[0xaa; 32]);
        coreboot::push_file(&mut area, 0x50, "c", &[], b"third");
        area.resize(area.len() + 8, 0xff);

        let records = walk(&area).unwrap();
        let names = records.iter().map(Record::name).collect::<Vec<_>>();
        assert_eq!(names, &["a", "b", "c"]);
        assert_eq!(records[2].file().data, b"third");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_listing() {
        let image = Image::new(coreboot::rom()).unwrap();
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["region"], "COREBOOT");
        let ramstage = &json["records"][2];
        assert_eq!(ramstage["name"], "fallback/ramstage");
        assert_eq!(ramstage["type"], "stage");
        assert_eq!(ramstage["compression"], "LZMA");
        assert_eq!(ramstage["size"], 96);
        assert_eq!(json["records"].as_array().unwrap().len(), 10);
    }
}
