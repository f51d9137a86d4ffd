// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Authenticated code modules (ACMs).
//!
//! An ACM starts with a fixed 128-byte little-endian header, followed by an
//! RSA key, a signature and a scratch area whose sizes depend on the header
//! version. Whatever follows, up to the size the header declares, is the
//! module itself (the "user area").

use core::fmt;

use zerocopy::byteorder::LittleEndian;
use zerocopy::byteorder::U16;
use zerocopy::byteorder::U32;
use zerocopy::FromBytes;
use zerocopy::LayoutVerified;
use zerocopy::Unaligned;

use crate::fit::slice;
use crate::fit::Error;
use crate::io;
use crate::io::Read as _;
use crate::wire::WireEnum as _;

#[derive(Clone, Copy, FromBytes, Unaligned)]
#[repr(C)]
struct RawAcmHeader {
    module_type: U16<LittleEndian>,
    module_sub_type: U16<LittleEndian>,
    header_len: U32<LittleEndian>,
    header_version: U32<LittleEndian>,
    chipset_id: U16<LittleEndian>,
    flags: U16<LittleEndian>,
    module_vendor: U32<LittleEndian>,
    date: U32<LittleEndian>,
    size: U32<LittleEndian>,
    txt_svn: U16<LittleEndian>,
    se_svn: U16<LittleEndian>,
    code_control: U32<LittleEndian>,
    error_entry_point: U32<LittleEndian>,
    gdt_limit: U32<LittleEndian>,
    gdt_base: U32<LittleEndian>,
    seg_sel: U32<LittleEndian>,
    entry_point: U32<LittleEndian>,
    reserved2: [u8; 64],
    key_size: U32<LittleEndian>,
    scratch_size: U32<LittleEndian>,
}

/// The length of the fixed ACM header.
pub const ACM_HEADER_LEN: usize = core::mem::size_of::<RawAcmHeader>();
static_assertions::const_assert_eq!(ACM_HEADER_LEN, 128);

/// The offset of the size field in the ACM header.
pub(crate) const SIZE_OFFSET: usize = 24;

wire_enum! {
    /// An ACM header version.
    pub enum AcmHeaderVersion: u32 {
        /// Version 0: 2048-bit key.
        V0 = 0x0,
        /// Version 3: 3072-bit key.
        V3 = 0x30000,
    }
}

impl AcmHeaderVersion {
    fn key_len(self) -> usize {
        match self {
            Self::V0 => 256,
            Self::V3 => 384,
        }
    }

    fn has_exponent(self) -> bool {
        self == Self::V0
    }

    fn scratch_len(self) -> usize {
        match self {
            Self::V0 => 572,
            Self::V3 => 832,
        }
    }

    /// Returns the length of everything before the user area.
    pub fn fixed_len(self) -> usize {
        let exponent = if self.has_exponent() { 4 } else { 0 };
        ACM_HEADER_LEN + 2 * self.key_len() + exponent + self.scratch_len()
    }
}

/// The fixed ACM header.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AcmHeader {
    pub module_type: u16,
    pub module_sub_type: u16,
    /// The header length, in dwords.
    pub header_len: u32,
    pub header_version: AcmHeaderVersion,
    pub chipset_id: u16,
    pub flags: u16,
    pub module_vendor: u32,
    /// The build date, as BCD `0xYYYYMMDD`.
    pub date: u32,
    /// The size of the whole module, in dwords.
    pub size: u32,
    pub txt_svn: u16,
    pub se_svn: u16,
    pub code_control: u32,
    pub error_entry_point: u32,
    pub gdt_limit: u32,
    pub gdt_base: u32,
    pub seg_sel: u32,
    pub entry_point: u32,
    pub reserved2: [u8; 64],
    /// The key size, in dwords.
    pub key_size: u32,
    /// The scratch size, in dwords.
    pub scratch_size: u32,
}

/// A decoded ACM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acm {
    /// The header.
    pub header: AcmHeader,
    /// The RSA modulus, little-endian.
    pub public_key: Vec<u8>,
    /// The RSA exponent, for version 0 headers.
    pub exponent: Option<u32>,
    /// The signature over the module.
    pub signature: Vec<u8>,
    /// The scratch area.
    pub scratch: Vec<u8>,
    /// The module code and data.
    pub user_area: Vec<u8>,
}

/// Reads the size an ACM declares for itself, in bytes, from its header.
pub(crate) fn declared_size(data: &[u8]) -> Result<usize, Error> {
    let mut r = slice(data, SIZE_OFFSET, 4)?;
    Ok(r.read_le::<u32>()? as usize * 4)
}

impl Acm {
    /// Decodes an ACM.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let (raw, mut r) =
            LayoutVerified::<_, RawAcmHeader>::new_unaligned_from_prefix(data)
                .ok_or(Error::Io(io::Error::BufferExhausted))?;

        let version = match AcmHeaderVersion::from_wire_value(
            raw.header_version.get(),
        ) {
            Some(v) => v,
            None => {
                return fail!(Error::UnknownAcmHeaderVersion(
                    raw.header_version.get()
                ))
            }
        };
        let key_len = raw.key_size.get() as usize * 4;
        check!(
            key_len == version.key_len(),
            Error::InvalidKeySize {
                expected: version.key_len(),
                actual: key_len,
            }
        );

        let size = raw.size.get() as usize * 4;
        check!(size >= version.fixed_len(), Error::UserAreaTooSmall);
        slice(data, 0, size)?;

        let public_key = r.read_vec(key_len)?;
        let exponent = if version.has_exponent() {
            Some(r.read_le()?)
        } else {
            None
        };
        let signature = r.read_vec(key_len)?;
        let scratch = r.read_vec(version.scratch_len())?;
        let user_area = data[version.fixed_len()..size].to_vec();

        let header = AcmHeader {
            module_type: raw.module_type.get(),
            module_sub_type: raw.module_sub_type.get(),
            header_len: raw.header_len.get(),
            header_version: version,
            chipset_id: raw.chipset_id.get(),
            flags: raw.flags.get(),
            module_vendor: raw.module_vendor.get(),
            date: raw.date.get(),
            size: raw.size.get(),
            txt_svn: raw.txt_svn.get(),
            se_svn: raw.se_svn.get(),
            code_control: raw.code_control.get(),
            error_entry_point: raw.error_entry_point.get(),
            gdt_limit: raw.gdt_limit.get(),
            gdt_base: raw.gdt_base.get(),
            seg_sel: raw.seg_sel.get(),
            entry_point: raw.entry_point.get(),
            reserved2: raw.reserved2,
            key_size: raw.key_size.get(),
            scratch_size: raw.scratch_size.get(),
        };
        Ok(Self {
            header,
            public_key,
            exponent,
            signature,
            scratch,
            user_area,
        })
    }
}

impl fmt::Display for Acm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            "ACM (header {}, type {:#x}:{:#x})",
            h.header_version, h.module_type, h.module_sub_type
        )?;
        writeln!(f, "  Vendor: {:#x}", h.module_vendor)?;
        writeln!(f, "  Date: {:08x}", h.date)?;
        writeln!(f, "  Size: {:#x}", h.size as usize * 4)?;
        writeln!(f, "  TXT SVN: {}, SE SVN: {}", h.txt_svn, h.se_svn)?;
        writeln!(f, "  Entry point: {:#x}", h.entry_point)?;
        write!(
            f,
            "  Key: {} bits, user area: {:#x} bytes",
            self.public_key.len() * 8,
            self.user_area.len()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use testutil::data::fit;

    #[test]
    fn version_3() {
        let data = fit::acm(0x30000, 96, 64);
        assert_eq!(data.len(), 0x700);
        assert_eq!(declared_size(&data).unwrap(), 0x700);

        let acm = Acm::parse(&data).unwrap();
        assert_eq!(acm.header.header_version, AcmHeaderVersion::V3);
        assert_eq!(acm.header.module_vendor, 0x8086);
        assert_eq!(acm.public_key.len(), 384);
        assert_eq!(acm.exponent, None);
        assert_eq!(acm.signature.len(), 384);
        assert_eq!(acm.scratch.len(), 832);
        assert_eq!(acm.user_area, &data[0x700 - 64..]);
        assert!(acm.to_string().contains("Key: 3072 bits"));
    }

    #[test]
    fn version_0() {
        let data = fit::acm(0x0, 64, 32);
        let acm = Acm::parse(&data).unwrap();
        assert_eq!(acm.header.header_version, AcmHeaderVersion::V0);
        assert_eq!(acm.exponent, Some(0x10001));
        assert_eq!(acm.public_key.len(), 256);
        assert_eq!(acm.user_area.len(), 32);
    }

    #[test]
    fn invalid_key_size() {
        let e = Acm::parse(&fit::acm(0x30000, 64, 64)).unwrap_err();
        assert_eq!(
            e,
            Error::InvalidKeySize {
                expected: 384,
                actual: 256
            }
        );
        assert!(e.to_string().contains("invalid key size"));
    }

    #[test]
    fn bad_headers() {
        assert_eq!(
            Acm::parse(&fit::acm(0x20000, 64, 64)),
            Err(Error::UnknownAcmHeaderVersion(0x20000))
        );

        let mut data = fit::acm(0x30000, 96, 64);
        // Declare a module smaller than its own header.
        data[SIZE_OFFSET..SIZE_OFFSET + 4]
            .copy_from_slice(&(0x100u32).to_le_bytes());
        let e = Acm::parse(&data).unwrap_err();
        assert_eq!(e, Error::UserAreaTooSmall);
        assert_eq!(e.to_string(), "UserArea too small");

        // Declare a module larger than the data.
        data[SIZE_OFFSET..SIZE_OFFSET + 4]
            .copy_from_slice(&(0x800u32).to_le_bytes());
        assert!(matches!(
            Acm::parse(&data),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
