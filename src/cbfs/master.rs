// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The CBFS master header.

use core::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::cbfs::Error;
use crate::io;
use crate::io::Read as _;
use crate::wire::WireEnum as _;

/// The master header magic, `"ORBC"`.
pub const MASTER_MAGIC: u32 = 0x4f524243;

/// The length of an encoded master header.
pub const MASTER_HEADER_LEN: usize = 32;

wire_enum! {
    /// The architecture a CBFS was built for.
    #[cfg_attr(feature = "serde", derive(Serialize))]
    pub enum Architecture: u32 {
        /// 32-bit or 64-bit x86.
        X86 = 0x00000001,
        /// 32-bit ARM.
        Arm = 0x00000010,
        /// 64-bit ARM.
        Aarch64 = 0x0000aa64,
        /// MIPS.
        Mips = 0x00000100,
        /// RISC-V.
        RiscV = 0xc001d0de,
        /// 64-bit PowerPC.
        Ppc64 = 0x407570ff,
        /// Architecture not recorded.
        Unknown = 0xffffffff,
    }
}

/// The master header, describing the CBFS as a whole.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MasterHeader {
    /// The header version; `0x31313131` or `0x31313132`.
    pub version: u32,
    /// The size of the ROM, in bytes.
    pub rom_size: u32,
    /// The size of the bootblock, in bytes.
    pub boot_block_size: u32,
    /// The file alignment; always 64 in practice.
    pub align: u32,
    /// The offset of the first file.
    pub offset: u32,
    /// The raw architecture; see [`Architecture`].
    pub architecture: u32,
    /// Padding.
    pub pad: u32,
    /// Anything following the header in the file body.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub trailer: Vec<u8>,
}

impl MasterHeader {
    /// Decodes a master header from a file body.
    pub fn decode(mut data: &[u8]) -> Result<Self, Error> {
        let magic = data.read_be::<u32>()?;
        check!(magic == MASTER_MAGIC, Error::BadMagic);
        let header = Self {
            version: data.read_be()?,
            rom_size: data.read_be()?,
            boot_block_size: data.read_be()?,
            align: data.read_be()?,
            offset: data.read_be()?,
            architecture: data.read_be()?,
            pad: data.read_be()?,
            trailer: data.to_vec(),
        };
        if header.align != 64 {
            warn!("unusual CBFS master header alignment {}", header.align);
        }
        Ok(header)
    }

    /// Encodes this header as a file body.
    pub fn encode(&self, mut w: impl io::Write) -> Result<(), Error> {
        w.write_be(MASTER_MAGIC)?;
        for &x in &[
            self.version,
            self.rom_size,
            self.boot_block_size,
            self.align,
            self.offset,
            self.architecture,
            self.pad,
        ] {
            w.write_be(x)?;
        }
        w.write_bytes(&self.trailer)?;
        Ok(())
    }

    /// Returns the architecture, if it is a known one.
    pub fn arch(&self) -> Option<Architecture> {
        Architecture::from_wire_value(self.architecture)
    }
}

impl fmt::Display for MasterHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "version={:#x} romsize={:#x} bootblocksize={:#x} align={} offset={:#x} arch=",
            self.version,
            self.rom_size,
            self.boot_block_size,
            self.align,
            self.offset,
        )?;
        match self.arch() {
            Some(a) => write!(f, "{}", a),
            None => write!(f, "{:#x}", self.architecture),
        }
    }
}
