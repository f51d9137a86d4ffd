// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! FIT entry headers.

use core::fmt;

use zerocopy::byteorder::LittleEndian;
use zerocopy::byteorder::U16;
use zerocopy::byteorder::U64;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::LayoutVerified;
use zerocopy::Unaligned;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::fit::Error;
use crate::io;
use crate::wire::WireEnum as _;

#[derive(Clone, Copy, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
struct RawHeaders {
    address: U64<LittleEndian>,
    size: [u8; 3],
    reserved: u8,
    version: U16<LittleEndian>,
    type_and_cv: u8,
    checksum: u8,
}

/// The length of an encoded entry header.
pub const HEADERS_LEN: usize = core::mem::size_of::<RawHeaders>();
static_assertions::const_assert_eq!(HEADERS_LEN, 16);

/// The checksum-valid bit of [`EntryHeaders::type_and_cv`].
const CV_BIT: u8 = 0x80;

/// The largest value the 24-bit size field can hold.
const MAX_SIZE: u32 = 0xff_ffff;

wire_enum! {
    /// The type of a FIT entry.
    #[cfg_attr(feature = "serde", derive(Serialize))]
    pub enum EntryType: u8 {
        /// The table header.
        FitHeader = 0x00,
        /// A microcode update.
        Microcode = 0x01,
        /// The startup authenticated code module.
        Sacm = 0x02,
        /// The diagnostic ACM.
        DiagnosticAcm = 0x03,
        /// A BIOS startup module.
        BiosStartupModule = 0x07,
        /// The TPM policy record.
        TpmPolicy = 0x08,
        /// The BIOS policy record.
        BiosPolicy = 0x09,
        /// The TXT policy record.
        TxtPolicy = 0x0a,
        /// A Boot Guard key manifest.
        KeyManifest = 0x0b,
        /// A Boot Guard boot policy manifest.
        BootPolicyManifest = 0x0c,
        /// CSE secure boot data.
        CseSecureBoot = 0x10,
        /// The feature policy delivery record.
        FeaturePolicyDelivery = 0x2d,
        /// The JMP debug policy.
        JmpDebugPolicy = 0x2f,
        /// An entry to be skipped.
        Skip = 0x7f,
    }
}

/// The headers of a single FIT entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct EntryHeaders {
    /// The physical address of the entry's data, or, for some entry types,
    /// the data itself.
    pub address: u64,
    /// The size of the entry's data in 16-byte units; a 24-bit field.
    pub size: u32,
    /// Reserved.
    pub reserved: u8,
    /// The entry version; usually [`ENTRY_VERSION`](super::ENTRY_VERSION).
    pub version: u16,
    /// The entry type in the low seven bits, and the checksum-valid flag in
    /// the top bit.
    pub type_and_cv: u8,
    /// A checksum making the sum of the encoded headers zero, if the
    /// checksum-valid flag is set.
    pub checksum: u8,
}

impl EntryHeaders {
    /// Creates headers for an entry of the given type, with all other
    /// fields zeroed.
    pub fn new(ty: EntryType) -> Self {
        Self {
            address: 0,
            size: 0,
            reserved: 0,
            version: 0,
            type_and_cv: ty.to_wire_value(),
            checksum: 0,
        }
    }

    /// Decodes headers from the start of `buf`.
    pub fn read(buf: &[u8]) -> Result<Self, Error> {
        let (raw, _) =
            LayoutVerified::<_, RawHeaders>::new_unaligned_from_prefix(buf)
                .ok_or(Error::Io(io::Error::BufferExhausted))?;
        let [s0, s1, s2] = raw.size;
        Ok(Self {
            address: raw.address.get(),
            size: u32::from_le_bytes([s0, s1, s2, 0]),
            reserved: raw.reserved,
            version: raw.version.get(),
            type_and_cv: raw.type_and_cv,
            checksum: raw.checksum,
        })
    }

    /// Encodes these headers.
    pub fn to_bytes(&self) -> [u8; HEADERS_LEN] {
        let [s0, s1, s2, _] = self.size.to_le_bytes();
        let raw = RawHeaders {
            address: U64::new(self.address),
            size: [s0, s1, s2],
            reserved: self.reserved,
            version: U16::new(self.version),
            type_and_cv: self.type_and_cv,
            checksum: self.checksum,
        };
        let mut out = [0; HEADERS_LEN];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// Returns the raw entry type.
    pub fn raw_type(&self) -> u8 {
        self.type_and_cv & !CV_BIT
    }

    /// Returns the entry type, if it is a known one.
    pub fn entry_type(&self) -> Option<EntryType> {
        EntryType::from_wire_value(self.raw_type())
    }

    /// Returns whether the checksum-valid flag is set.
    pub fn checksum_valid(&self) -> bool {
        self.type_and_cv & CV_BIT != 0
    }

    /// Sets or clears the checksum-valid flag.
    pub fn set_checksum_valid(&mut self, cv: bool) {
        if cv {
            self.type_and_cv |= CV_BIT;
        } else {
            self.type_and_cv &= !CV_BIT;
        }
    }

    /// Sets the size field.
    pub fn set_size(&mut self, size: usize) -> Result<(), Error> {
        check!(size <= MAX_SIZE as usize, Error::DataTooLarge(size));
        self.size = size as u32;
        Ok(())
    }

    /// Returns the size of the entry's data, in bytes, according to the
    /// size field.
    pub fn data_size(&self) -> usize {
        self.size as usize * 16
    }

    /// Computes the checksum these headers should carry.
    pub fn compute_checksum(&self) -> u8 {
        let mut headers = *self;
        headers.checksum = 0;
        let sum = headers
            .to_bytes()
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_add(b));
        0u8.wrapping_sub(sum)
    }

    /// Returns whether the checksum is consistent with the contents.
    ///
    /// Headers without the checksum-valid flag are always consistent.
    pub fn checksum_is_consistent(&self) -> bool {
        !self.checksum_valid() || self.compute_checksum() == self.checksum
    }

    /// Recomputes the checksum field. Must be the last edit.
    pub fn update_checksum(&mut self) {
        self.checksum = self.compute_checksum();
    }
}

impl fmt::Display for EntryHeaders {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self.entry_type() {
            Some(ty) => ty.name().to_string(),
            None => format!("Unknown({:#04x})", self.raw_type()),
        };
        write!(
            f,
            "{:<22} {:#018x} {:#08x} {:#06x} {:<5} {:#04x}",
            name,
            self.address,
            self.size,
            self.version,
            self.checksum_valid(),
            self.checksum
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use testutil::data::fit;

    #[test]
    fn decode() {
        let raw = fit::entry(0xffff_1000, 0x80, 0x0100, 0x01, true);
        let h = EntryHeaders::read(&raw).unwrap();
        assert_eq!(h.address, 0xffff_1000);
        assert_eq!(h.size, 0x80);
        assert_eq!(h.version, 0x0100);
        assert_eq!(h.entry_type(), Some(EntryType::Microcode));
        assert!(h.checksum_valid());
        assert!(h.checksum_is_consistent());
        assert_eq!(h.to_bytes(), raw);

        let sum = raw.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(sum, 0);
    }

    #[test]
    fn checksum() {
        let raw = fit::entry(0xffff_1000, 0x80, 0x0100, 0x01, true);
        let mut h = EntryHeaders::read(&raw).unwrap();
        h.size += 1;
        assert!(!h.checksum_is_consistent());
        h.update_checksum();
        assert!(h.checksum_is_consistent());

        h.set_checksum_valid(false);
        h.checksum = 0x12;
        assert!(h.checksum_is_consistent());
    }

    #[test]
    fn types() {
        let mut raw = fit::entry(0, 0, 0, 0x55, false);
        let h = EntryHeaders::read(&raw).unwrap();
        assert_eq!(h.entry_type(), None);
        assert!(h.to_string().starts_with("Unknown(0x55)"));

        raw[14] = 0x7f | 0x80;
        let h = EntryHeaders::read(&raw).unwrap();
        assert_eq!(h.entry_type(), Some(EntryType::Skip));
    }

    #[test]
    fn size_field() {
        let mut h = EntryHeaders::new(EntryType::BiosStartupModule);
        h.set_size(0xff_ffff).unwrap();
        assert_eq!(&h.to_bytes()[8..12], &[0xff, 0xff, 0xff, 0][..]);
        assert_eq!(
            h.set_size(0x100_0000),
            Err(Error::DataTooLarge(0x100_0000))
        );
        assert_eq!(
            EntryHeaders::read(&[0; 15]),
            Err(Error::Io(io::Error::BufferExhausted))
        );
    }
}
