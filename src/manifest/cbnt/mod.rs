// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Converged Boot Guard and TXT (CBnT) manifests.
//!
//! CBnT struct infos are twelve bytes long and carry the size of their
//! element, which allows elements this crate does not interpret to be
//! carried along verbatim.

use crate::io;
use crate::io::Read as _;
use crate::manifest::common::read_id;
use crate::manifest::Error;
use crate::manifest::STRUCT_ID_LEN;

mod key;
mod policy;

pub use key::KeyHash;
pub use key::KeyManifest;
pub use key::Usage;
pub use policy::BootPolicyManifest;
pub use policy::Bpmh;
pub use policy::Element;
pub use policy::HashList;
pub use policy::Pmse;
pub use policy::PowerManagement;
pub use policy::Se;

/// The length of a CBnT struct info.
pub const STRUCT_INFO_LEN: usize = STRUCT_ID_LEN + 4;

/// The header at the start of every CBnT element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructInfo {
    /// The structure ID.
    pub id: [u8; STRUCT_ID_LEN],
    /// The structure version.
    pub version: u8,
    /// An element-specific byte.
    pub variable0: u8,
    /// The length of the whole element, including this header.
    ///
    /// Some elements store zero here.
    pub element_size: u16,
}

impl StructInfo {
    /// Creates a struct info.
    pub fn new(id: &[u8; STRUCT_ID_LEN], version: u8) -> Self {
        Self {
            id: *id,
            version,
            variable0: 0,
            element_size: 0,
        }
    }

    /// Reads a struct info, requiring the given ID and a CBnT version.
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
        check!(version >= 0x20, Error::BadVersion { id: found, version });
        Ok(Self {
            id: found,
            version,
            variable0: r.read_le()?,
            element_size: r.read_le()?,
        })
    }

    pub(crate) fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        w.write_bytes(&self.id)?;
        w.write_le(self.version)?;
        w.write_le(self.variable0)?;
        w.write_le(self.element_size)?;
        Ok(())
    }
}
