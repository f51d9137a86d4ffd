// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! FIT entries: headers together with the data they point to.

use core::fmt;
use core::ops::Range;

use crate::fit::acm;
use crate::fit::phys_to_offset;
use crate::fit::slice;
use crate::fit::Acm;
use crate::fit::EntryHeaders;
use crate::fit::EntryType;
use crate::fit::Error;
use crate::fit::PolicyAddress;
use crate::fit::ENTRY_VERSION;
use crate::fit::HEADERS_MAGIC;
use crate::io::Read as _;
use crate::manifest;

/// The offset of `TotalSize` in a microcode update header.
const MICROCODE_TOTAL_SIZE_OFFSET: usize = 0x20;

/// The size of a microcode update whose header says zero.
const MICROCODE_DEFAULT_SIZE: usize = 2048;

/// The parts every entry has.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryBase {
    /// The entry headers.
    pub headers: EntryHeaders,
    /// The data the headers point to; empty for entries without data.
    pub data: Vec<u8>,
    /// Problems found while decoding this entry.
    ///
    /// If this is not empty, `data` should not be trusted.
    pub headers_errors: Vec<Error>,
}

impl EntryBase {
    /// Creates an entry with no data and no errors.
    pub fn new(headers: EntryHeaders) -> Self {
        Self {
            headers,
            data: Vec::new(),
            headers_errors: Vec::new(),
        }
    }

    /// Applies the usual header rules: checksum-valid set, version
    /// `0x0100`, the size of the data, and a fresh checksum.
    fn recalculate_common(&mut self, size: usize) -> Result<(), Error> {
        let h = &mut self.headers;
        h.set_checksum_valid(true);
        h.version = ENTRY_VERSION;
        h.set_size(size)?;
        h.update_checksum();
        Ok(())
    }
}

/// A FIT entry, by type.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Entry {
    FitHeader(EntryBase),
    Microcode(EntryBase),
    Sacm(EntryBase),
    DiagnosticAcm(EntryBase),
    BiosStartupModule(EntryBase),
    TpmPolicy(EntryBase),
    BiosPolicy(EntryBase),
    TxtPolicy(EntryBase),
    KeyManifest(EntryBase),
    BootPolicyManifest(EntryBase),
    CseSecureBoot(EntryBase),
    FeaturePolicyDelivery(EntryBase),
    JmpDebugPolicy(EntryBase),
    Skip(EntryBase),
    /// An entry of a type this crate does not know; its data is carried
    /// verbatim.
    Unknown(EntryBase),
}

/// The interpreted data of an entry; see [`Entry::parse_data()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryData {
    /// A startup ACM.
    Acm(Acm),
    /// A key manifest.
    KeyManifest(manifest::KeyManifest),
    /// A boot policy manifest.
    BootPolicyManifest(manifest::BootPolicyManifest),
    /// The location of the TXT policy bit.
    TxtPolicy(PolicyAddress),
    /// Data this crate does not interpret; see [`Entry::data()`].
    Opaque,
}

/// Returns the range of `image` holding the data of the entry with the
/// given headers, if it has any.
fn data_range(
    headers: &EntryHeaders,
    image: &[u8],
) -> Result<Option<Range<usize>>, Error> {
    let ty = headers.entry_type();
    match ty {
        Some(EntryType::FitHeader) | Some(EntryType::TxtPolicy) => {
            return Ok(None)
        }
        Some(t @ EntryType::DiagnosticAcm) | Some(t @ EntryType::TpmPolicy) => {
            return fail!(Error::NotSupported(t))
        }
        _ => {}
    }

    let offset = phys_to_offset(headers.address, image.len())?;
    let len = match ty {
        Some(EntryType::Sacm) => acm::declared_size(slice(
            image,
            offset,
            acm::SIZE_OFFSET + 4,
        )?)?,
        Some(EntryType::Microcode) if headers.size == 0 => {
            let mut r =
                slice(image, offset + MICROCODE_TOTAL_SIZE_OFFSET, 4)?;
            match r.read_le::<u32>()? {
                0 => MICROCODE_DEFAULT_SIZE,
                n => n as usize,
            }
        }
        _ => headers.data_size(),
    };
    slice(image, offset, len)?;
    Ok(Some(offset..offset + len))
}

impl Entry {
    /// Decodes the entry with the given headers, pulling its data out of
    /// `image`.
    ///
    /// This never fails: problems are recorded in
    /// [`EntryBase::headers_errors`].
    pub fn decode(headers: EntryHeaders, image: &[u8]) -> Self {
        let mut base = EntryBase::new(headers);
        if !headers.checksum_is_consistent() {
            warn!("FIT entry checksum mismatch: {}", headers);
            base.headers_errors.push(Error::ChecksumMismatch);
        }
        match data_range(&headers, image) {
            Ok(Some(range)) => base.data = image[range].to_vec(),
            Ok(None) => {}
            Err(e) => base.headers_errors.push(e),
        }
        Self::from_base(base)
    }

    /// Wraps `base` in the variant its headers name.
    pub fn from_base(base: EntryBase) -> Self {
        let ty = match base.headers.entry_type() {
            Some(ty) => ty,
            None => {
                warn!("unknown FIT entry type {:#x}", base.headers.raw_type());
                return Self::Unknown(base);
            }
        };
        match ty {
            EntryType::FitHeader => Self::FitHeader(base),
            EntryType::Microcode => Self::Microcode(base),
            EntryType::Sacm => Self::Sacm(base),
            EntryType::DiagnosticAcm => Self::DiagnosticAcm(base),
            EntryType::BiosStartupModule => Self::BiosStartupModule(base),
            EntryType::TpmPolicy => Self::TpmPolicy(base),
            EntryType::BiosPolicy => Self::BiosPolicy(base),
            EntryType::TxtPolicy => Self::TxtPolicy(base),
            EntryType::KeyManifest => Self::KeyManifest(base),
            EntryType::BootPolicyManifest => Self::BootPolicyManifest(base),
            EntryType::CseSecureBoot => Self::CseSecureBoot(base),
            EntryType::FeaturePolicyDelivery => {
                Self::FeaturePolicyDelivery(base)
            }
            EntryType::JmpDebugPolicy => Self::JmpDebugPolicy(base),
            EntryType::Skip => Self::Skip(base),
        }
    }

    /// Returns the parts every entry has.
    pub fn base(&self) -> &EntryBase {
        match self {
            Self::FitHeader(b)
            | Self::Microcode(b)
            | Self::Sacm(b)
            | Self::DiagnosticAcm(b)
            | Self::BiosStartupModule(b)
            | Self::TpmPolicy(b)
            | Self::BiosPolicy(b)
            | Self::TxtPolicy(b)
            | Self::KeyManifest(b)
            | Self::BootPolicyManifest(b)
            | Self::CseSecureBoot(b)
            | Self::FeaturePolicyDelivery(b)
            | Self::JmpDebugPolicy(b)
            | Self::Skip(b)
            | Self::Unknown(b) => b,
        }
    }

    /// Returns the parts every entry has.
    pub fn base_mut(&mut self) -> &mut EntryBase {
        match self {
            Self::FitHeader(b)
            | Self::Microcode(b)
            | Self::Sacm(b)
            | Self::DiagnosticAcm(b)
            | Self::BiosStartupModule(b)
            | Self::TpmPolicy(b)
            | Self::BiosPolicy(b)
            | Self::TxtPolicy(b)
            | Self::KeyManifest(b)
            | Self::BootPolicyManifest(b)
            | Self::CseSecureBoot(b)
            | Self::FeaturePolicyDelivery(b)
            | Self::JmpDebugPolicy(b)
            | Self::Skip(b)
            | Self::Unknown(b) => b,
        }
    }

    /// Returns the entry headers.
    pub fn headers(&self) -> &EntryHeaders {
        &self.base().headers
    }

    /// Returns the entry's data.
    pub fn data(&self) -> &[u8] {
        &self.base().data
    }

    /// Returns the problems found while decoding this entry.
    pub fn headers_errors(&self) -> &[Error] {
        &self.base().headers_errors
    }

    /// Rewrites the headers to be consistent with the data, for a table of
    /// `entry_count` entries.
    pub fn recalculate_headers(
        &mut self,
        entry_count: usize,
    ) -> Result<(), Error> {
        match self {
            Self::FitHeader(b) => {
                b.headers.address = u64::from_le_bytes(*HEADERS_MAGIC);
                b.recalculate_common(entry_count)
            }
            // The size lives in the ACM header.
            Self::Sacm(b) => b.recalculate_common(0),
            Self::TxtPolicy(b) => {
                b.data.clear();
                let h = &mut b.headers;
                h.set_checksum_valid(false);
                h.size = 0;
                h.checksum = 0;
                Ok(())
            }
            Self::DiagnosticAcm(_) => {
                fail!(Error::NotSupported(EntryType::DiagnosticAcm))
            }
            Self::TpmPolicy(_) => fail!(Error::NotSupported(EntryType::TpmPolicy)),
            other => {
                let b = other.base_mut();
                let size = b.data.len() >> 4;
                b.recalculate_common(size)
            }
        }
    }

    /// Interprets the entry's data.
    pub fn parse_data(&self) -> Result<EntryData, Error> {
        match self {
            Self::Sacm(b) => Ok(EntryData::Acm(Acm::parse(&b.data)?)),
            Self::KeyManifest(b) => {
                let (km, _) = manifest::KeyManifest::read_from(&b.data)?;
                Ok(EntryData::KeyManifest(km))
            }
            Self::BootPolicyManifest(b) => {
                let (bpm, _) =
                    manifest::BootPolicyManifest::read_from(&b.data)?;
                Ok(EntryData::BootPolicyManifest(bpm))
            }
            Self::TxtPolicy(b) => Ok(EntryData::TxtPolicy(
                PolicyAddress::decode(b.headers.version, b.headers.address)?,
            )),
            _ => Ok(EntryData::Opaque),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.base();
        write!(f, "{} data={:#x}", b.headers, b.data.len())?;
        for e in &b.headers_errors {
            write!(f, " [{}]", e)?;
        }
        Ok(())
    }
}
