// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Boot Guard 1.0 manifests.
//!
//! Boot Guard struct infos are only nine bytes long: an ID and a version.
//! Elements carry no size, so a manifest can only be walked by decoding
//! every element in full.

use crate::io;
use crate::io::Read as _;
use crate::manifest::common::read_id;
use crate::manifest::Error;
use crate::manifest::STRUCT_ID_LEN;

mod key;
mod policy;

pub use key::KeyManifest;
pub use policy::BootPolicyManifest;
pub use policy::Bpmh;
pub use policy::Pmsg;
pub use policy::PowerManagement;
pub use policy::Se;

/// The length of a Boot Guard struct info.
pub const STRUCT_INFO_LEN: usize = STRUCT_ID_LEN + 1;

/// The version most Boot Guard structures carry.
pub const VERSION: u8 = 0x10;

/// The header at the start of every Boot Guard element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructInfo {
    /// The structure ID.
    pub id: [u8; STRUCT_ID_LEN],
    /// The structure version.
    pub version: u8,
}

impl StructInfo {
    /// Creates a struct info with the usual version.
    pub fn new(id: &[u8; STRUCT_ID_LEN]) -> Self {
        Self { id: *id, version: VERSION }
    }

    /// Reads a struct info, requiring the given ID and a Boot Guard
    /// version.
    pub(crate) fn read(
        r: &mut &[u8],
        id: &[u8; STRUCT_ID_LEN],
    ) -> Result<Self, Error> {
        let found = read_id(r)?;
        check!(
            &found == id,
            Error::BadStructId {
                expected: *id,
                found,
            }
        );
        let version = r.read_le::<u8>()?;
        check!(
            (0x10..=0x1f).contains(&version),
            Error::BadVersion { id: found, version }
        );
        Ok(Self { id: found, version })
    }

    pub(crate) fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        w.write_bytes(&self.id)?;
        w.write_le(self.version)?;
        Ok(())
    }
}
