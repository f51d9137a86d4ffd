// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! TXT policy records.
//!
//! A TXT policy entry has no data of its own: its address field says where
//! the TXT policy bit lives, in one of two encodings picked by the entry
//! version.

use core::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::fit::Error;

/// The location of the TXT policy bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum PolicyAddress {
    /// Version 0: a bit in an indexed I/O register pair, such as CMOS.
    IndexedIo {
        /// The port the index is written to.
        index_io: u16,
        /// The port the data is read from.
        data_io: u16,
        /// The access width, in bits.
        access_width: u8,
        /// The position of the policy bit.
        bit_position: u8,
        /// The register index.
        index: u16,
    },
    /// Version 1: a flat physical address.
    Flat(u64),
}

impl PolicyAddress {
    /// Decodes the address field of a TXT policy entry with the given
    /// version.
    pub fn decode(version: u16, address: u64) -> Result<Self, Error> {
        let b = address.to_le_bytes();
        match version {
            0 => Ok(Self::IndexedIo {
                index_io: u16::from_le_bytes([b[0], b[1]]),
                data_io: u16::from_le_bytes([b[2], b[3]]),
                access_width: b[4],
                bit_position: b[5],
                index: u16::from_le_bytes([b[6], b[7]]),
            }),
            1 => Ok(Self::Flat(address)),
            v => fail!(Error::UnknownTxtPolicyVersion(v)),
        }
    }

    /// Returns the entry version this address needs.
    pub fn version(&self) -> u16 {
        match self {
            Self::IndexedIo { .. } => 0,
            Self::Flat(_) => 1,
        }
    }

    /// Encodes this into an address field.
    pub fn encode(&self) -> u64 {
        match *self {
            Self::IndexedIo {
                index_io,
                data_io,
                access_width,
                bit_position,
                index,
            } => {
                let [i0, i1] = index_io.to_le_bytes();
                let [d0, d1] = data_io.to_le_bytes();
                let [x0, x1] = index.to_le_bytes();
                u64::from_le_bytes([
                    i0,
                    i1,
                    d0,
                    d1,
                    access_width,
                    bit_position,
                    x0,
                    x1,
                ])
            }
            Self::Flat(addr) => addr,
        }
    }
}

impl fmt::Display for PolicyAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::IndexedIo {
                index_io,
                data_io,
                access_width,
                bit_position,
                index,
            } => write!(
                f,
                "TXT policy: io {:#x}/{:#x} index {:#x} bit {} ({}-bit access)",
                index_io, data_io, index, bit_position, access_width
            ),
            Self::Flat(addr) => write!(f, "TXT policy: address {:#x}", addr),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indexed_io() {
        let addr = PolicyAddress::decode(0, 0x000c_0008_0071_0070).unwrap();
        assert_eq!(
            addr,
            PolicyAddress::IndexedIo {
                index_io: 0x70,
                data_io: 0x71,
                access_width: 8,
                bit_position: 0,
                index: 0x0c,
            }
        );
        assert_eq!(addr.encode(), 0x000c_0008_0071_0070);
        assert_eq!(addr.version(), 0);
    }

    #[test]
    fn flat_and_unknown() {
        let addr = PolicyAddress::decode(1, 0xfed3_0880).unwrap();
        assert_eq!(addr, PolicyAddress::Flat(0xfed3_0880));
        assert_eq!(addr.to_string(), "TXT policy: address 0xfed30880");
        assert_eq!(
            PolicyAddress::decode(2, 0),
            Err(Error::UnknownTxtPolicyVersion(2))
        );
    }
}
