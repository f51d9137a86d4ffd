// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The Boot Guard boot policy manifest.
//!
//! The header (`__ACBP__`) is followed by one or more IBB elements
//! (`__IBBS__`), optionally the platform manufacturer data (`__PMDA__`),
//! and the signature element (`__PMSG__`), in that order.

use core::fmt;

use crate::crypto::sig;
use crate::io;
use crate::io::Read as _;
use crate::manifest::bg::StructInfo;
use crate::manifest::common::check_reserved;
use crate::manifest::common::len_u16;
use crate::manifest::common::peek_id;
use crate::manifest::Algorithm;
use crate::manifest::Error;
use crate::manifest::HashStructure;
use crate::manifest::IbbSegment;
use crate::manifest::KeySignature;
use crate::manifest::BPMH_ID;
use crate::manifest::PMSG_ID;
use crate::manifest::PM_ID;
use crate::manifest::SE_ID;
use crate::manifest::STRUCT_ID_LEN;

/// The boot policy manifest header (`__ACBP__`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bpmh {
    /// The struct info.
    pub struct_info: StructInfo,
    /// The header structure version.
    pub hdr_struct_version: u8,
    /// The manifest revision.
    pub pm_bpm_version: u8,
    /// The security version number.
    pub bpm_svn: u8,
    /// The minimum ACM SVN this policy accepts.
    pub acm_svn_auth: u8,
    /// Reserved.
    pub reserved0: [u8; 1],
    /// The size of the no-evict-mode data stack, in 4K pages.
    pub nem_data_stack: u16,
}

impl Bpmh {
    fn read(r: &mut &[u8]) -> Result<Self, Error> {
        let bpmh = Self {
            struct_info: StructInfo::read(r, BPMH_ID)?,
            hdr_struct_version: r.read_le()?,
            pm_bpm_version: r.read_le()?,
            bpm_svn: r.read_le()?,
            acm_svn_auth: r.read_le()?,
            reserved0: r.read_array()?,
            nem_data_stack: r.read_le()?,
        };
        check_reserved("BPMH.Reserved0", &bpmh.reserved0);
        Ok(bpmh)
    }

    fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        self.struct_info.write(&mut w)?;
        w.write_le(self.hdr_struct_version)?;
        w.write_le(self.pm_bpm_version)?;
        w.write_le(self.bpm_svn)?;
        w.write_le(self.acm_svn_auth)?;
        w.write_bytes(&self.reserved0)?;
        w.write_le(self.nem_data_stack)?;
        Ok(())
    }
}

/// An initial boot block element (`__IBBS__`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Se {
    /// The struct info.
    pub struct_info: StructInfo,
    /// Reserved.
    pub reserved0: [u8; 1],
    /// The IBB set this element describes.
    pub set_number: u8,
    /// Reserved.
    pub reserved1: [u8; 1],
    /// The boot enforcement timer value.
    pub pbet_value: u8,
    /// IBB flags.
    pub flags: u32,
    /// The MCHBAR the IBB expects.
    pub ibb_mchbar: u64,
    /// The VT-d BAR the IBB expects.
    pub vtd_bar: u64,
    /// The base of the protected memory range.
    pub pmrl_base: u32,
    /// The limit of the protected memory range.
    pub pmrl_limit: u32,
    /// Reserved.
    pub reserved2: [u8; 8],
    /// The digest of the code run after the IBB.
    pub post_ibb_hash: HashStructure,
    /// The IBB entry point.
    pub entry_point: u32,
    /// The digest of the IBB segments.
    pub digest: HashStructure,
    /// The IBB segments.
    pub ibb_segments: Vec<IbbSegment>,
}

impl Se {
    fn read(r: &mut &[u8]) -> Result<Self, Error> {
        let se = Self {
            struct_info: StructInfo::read(r, SE_ID)?,
            reserved0: r.read_array()?,
            set_number: r.read_le()?,
            reserved1: r.read_array()?,
            pbet_value: r.read_le()?,
            flags: r.read_le()?,
            ibb_mchbar: r.read_le()?,
            vtd_bar: r.read_le()?,
            pmrl_base: r.read_le()?,
            pmrl_limit: r.read_le()?,
            reserved2: r.read_array()?,
            post_ibb_hash: HashStructure::read(r)?,
            entry_point: r.read_le()?,
            digest: HashStructure::read(r)?,
            ibb_segments: IbbSegment::read_list(r)?,
        };
        check_reserved("SE.Reserved0", &se.reserved0);
        check_reserved("SE.Reserved1", &se.reserved1);
        check_reserved("SE.Reserved2", &se.reserved2);
        Ok(se)
    }

    fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        self.struct_info.write(&mut w)?;
        w.write_bytes(&self.reserved0)?;
        w.write_le(self.set_number)?;
        w.write_bytes(&self.reserved1)?;
        w.write_le(self.pbet_value)?;
        w.write_le(self.flags)?;
        w.write_le(self.ibb_mchbar)?;
        w.write_le(self.vtd_bar)?;
        w.write_le(self.pmrl_base)?;
        w.write_le(self.pmrl_limit)?;
        w.write_bytes(&self.reserved2)?;
        self.post_ibb_hash.write(&mut w)?;
        w.write_le(self.entry_point)?;
        self.digest.write(&mut w)?;
        IbbSegment::write_list(&self.ibb_segments, &mut w)?;
        Ok(())
    }
}

/// Platform manufacturer data (`__PMDA__`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowerManagement {
    /// The struct info.
    pub struct_info: StructInfo,
    /// The opaque data.
    pub data: Vec<u8>,
}

impl PowerManagement {
    fn read(r: &mut &[u8]) -> Result<Self, Error> {
        let struct_info = StructInfo::read(r, PM_ID)?;
        let len = r.read_le::<u16>()?;
        let data = r.read_vec(len as usize)?;
        Ok(Self { struct_info, data })
    }

    fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        self.struct_info.write(&mut w)?;
        w.write_le(len_u16(self.data.len())?)?;
        w.write_bytes(&self.data)?;
        Ok(())
    }
}

/// The boot policy signature element (`__PMSG__`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pmsg {
    /// The struct info.
    pub struct_info: StructInfo,
    /// The boot policy key and its signature over the manifest.
    pub key_signature: KeySignature,
}

/// A Boot Guard boot policy manifest.
///
/// Elements are always encoded in the order IBB elements, platform data,
/// signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootPolicyManifest {
    /// The header.
    pub bpmh: Bpmh,
    /// The IBB elements; there is at least one.
    pub se: Vec<Se>,
    /// The platform manufacturer data, if any.
    pub pm: Option<PowerManagement>,
    /// The signature element.
    pub pmsg: Pmsg,
}

impl BootPolicyManifest {
    /// Decodes a boot policy manifest from the start of `data`, returning it
    /// together with the number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize), Error> {
        let mut r = data;
        let bpmh = Bpmh::read(&mut r)?;

        let mut se = Vec::new();
        let mut pm = None;
        let pmsg = loop {
            let mut id = [0; STRUCT_ID_LEN];
            match peek_id(r) {
                Some(found) => id.copy_from_slice(found),
                None => return fail!(Error::MissingElement(*PMSG_ID)),
            }
            if &id == SE_ID {
                check!(pm.is_none(), Error::UnexpectedElement(id));
                se.push(Se::read(&mut r)?);
            } else if &id == PM_ID {
                check!(pm.is_none(), Error::UnexpectedElement(id));
                pm = Some(PowerManagement::read(&mut r)?);
            } else if &id == PMSG_ID {
                let struct_info = StructInfo::read(&mut r, PMSG_ID)?;
                let key_signature = KeySignature::read(&mut r)?;
                break Pmsg {
                    struct_info,
                    key_signature,
                };
            } else {
                return fail!(Error::BadStructId {
                    expected: *PMSG_ID,
                    found: id,
                });
            }
        };
        check!(!se.is_empty(), Error::MissingElement(*SE_ID));

        let bpm = Self { bpmh, se, pm, pmsg };
        Ok((bpm, data.len() - r.len()))
    }

    /// Returns the bytes covered by the signature: everything up to the
    /// key-signature pair in the signature element.
    pub fn signed_data(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        self.bpmh.write(&mut buf)?;
        for se in &self.se {
            se.write(&mut buf)?;
        }
        if let Some(pm) = &self.pm {
            pm.write(&mut buf)?;
        }
        self.pmsg.struct_info.write(&mut buf)?;
        Ok(buf)
    }

    /// Returns the offset of the key-signature pair.
    pub fn key_signature_offset(&self) -> Result<usize, Error> {
        Ok(self.signed_data()?.len())
    }

    /// Encodes this manifest, returning the number of bytes written.
    pub fn write_to(&self, mut w: impl io::Write) -> Result<usize, Error> {
        let mut buf = self.signed_data()?;
        self.pmsg.key_signature.write(&mut buf)?;
        w.write_bytes(&buf)?;
        Ok(buf.len())
    }

    /// Checks the signature over this manifest.
    pub fn verify(
        &self,
        verifier: &mut (impl sig::Verify + ?Sized),
    ) -> Result<(), Error> {
        self.pmsg
            .key_signature
            .verify(verifier, &self.signed_data()?)
    }

    /// Re-signs this manifest.
    pub fn set_signature(
        &mut self,
        signer: &mut (impl sig::Sign + ?Sized),
        scheme: Algorithm,
        hash_alg: Algorithm,
    ) -> Result<(), Error> {
        let signed = self.signed_data()?;
        self.pmsg
            .key_signature
            .set_signature(signer, scheme, hash_alg, &signed)
    }
}

impl fmt::Display for BootPolicyManifest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let h = &self.bpmh;
        writeln!(
            f,
            "Boot Guard Boot Policy Manifest (version {:#x})",
            h.struct_info.version
        )?;
        writeln!(f, "  PMBPMVersion: {:#x}", h.pm_bpm_version)?;
        writeln!(f, "  BPMSVN: {}", h.bpm_svn)?;
        writeln!(f, "  ACMSVNAuth: {}", h.acm_svn_auth)?;
        writeln!(f, "  NEMDataStack: {:#x}", h.nem_data_stack)?;
        for se in &self.se {
            writeln!(
                f,
                "  IBB set {}: flags={:#x} entry={:#010x}",
                se.set_number, se.flags, se.entry_point
            )?;
            writeln!(f, "    PostIBBHash: {}", se.post_ibb_hash)?;
            writeln!(f, "    Digest: {}", se.digest)?;
            for seg in &se.ibb_segments {
                writeln!(f, "    Segment: {}", seg)?;
            }
        }
        if let Some(pm) = &self.pm {
            writeln!(f, "  PMDA: {} bytes", pm.data.len())?;
        }
        writeln!(f, "{}", self.pmsg.key_signature)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manifest::bg::STRUCT_INFO_LEN;
    use crate::manifest::fake;
    use pretty_assertions::assert_eq;
    use testutil::data::manifest;

    #[test]
    fn round_trip() {
        let blob = manifest::bg_boot_policy_manifest();
        let (bpm, len) = BootPolicyManifest::read_from(&blob).unwrap();
        assert_eq!(len, blob.len());
        assert_eq!(bpm.bpmh.nem_data_stack, 0x100);
        assert_eq!(bpm.se.len(), 1);
        assert_eq!(bpm.se[0].ibb_segments.len(), 2);
        assert_eq!(bpm.se[0].ibb_segments[1].base, 0xffff0000);
        assert_eq!(bpm.se[0].entry_point, 0xfffffff0);
        assert_eq!(bpm.pm.as_ref().unwrap().data.len(), 8);

        let mut out = Vec::new();
        assert_eq!(bpm.write_to(&mut out).unwrap(), blob.len());
        assert_eq!(out, blob);

        let (again, _) = BootPolicyManifest::read_from(&out).unwrap();
        assert_eq!(again.to_string(), bpm.to_string());
        assert!(bpm.to_string().contains("base=0xfffe0000 size=0x10000"));
    }

    #[test]
    fn signature_offset() {
        let blob = manifest::bg_boot_policy_manifest();
        let (bpm, _) = BootPolicyManifest::read_from(&blob).unwrap();
        let offset = bpm.key_signature_offset().unwrap();
        assert_eq!(&blob[offset - STRUCT_INFO_LEN..offset - 1], PMSG_ID);
    }

    #[test]
    fn missing_elements() {
        let blob = manifest::bg_boot_policy_manifest();
        let (bpm, _) = BootPolicyManifest::read_from(&blob).unwrap();

        let mut no_se = bpm.clone();
        no_se.se.clear();
        let mut out = Vec::new();
        no_se.write_to(&mut out).unwrap();
        assert_eq!(
            BootPolicyManifest::read_from(&out),
            Err(Error::MissingElement(*SE_ID))
        );

        let offset = bpm.key_signature_offset().unwrap();
        assert_eq!(
            BootPolicyManifest::read_from(&blob[..offset - STRUCT_INFO_LEN]),
            Err(Error::MissingElement(*PMSG_ID))
        );

        let mut bogus = blob.clone();
        bogus[offset - STRUCT_INFO_LEN..offset - 1].copy_from_slice(b"__XXXX__");
        assert!(matches!(
            BootPolicyManifest::read_from(&bogus),
            Err(Error::BadStructId { .. })
        ));
    }

    /// Encodes the given elements between the header and the signature.
    fn encode_with(
        bpm: &BootPolicyManifest,
        body: impl FnOnce(&mut Vec<u8>),
    ) -> Vec<u8> {
        let mut out = Vec::new();
        bpm.bpmh.write(&mut out).unwrap();
        body(&mut out);
        bpm.pmsg.struct_info.write(&mut out).unwrap();
        bpm.pmsg.key_signature.write(&mut out).unwrap();
        out
    }

    #[test]
    fn element_order() {
        let blob = manifest::bg_boot_policy_manifest();
        let (bpm, _) = BootPolicyManifest::read_from(&blob).unwrap();
        let se = &bpm.se[0];
        let pm = bpm.pm.as_ref().unwrap();

        let canonical = encode_with(&bpm, |out| {
            se.write(&mut *out).unwrap();
            pm.write(&mut *out).unwrap();
        });
        assert_eq!(canonical, blob);

        let two_pm = encode_with(&bpm, |out| {
            se.write(&mut *out).unwrap();
            pm.write(&mut *out).unwrap();
            pm.write(&mut *out).unwrap();
        });
        assert_eq!(
            BootPolicyManifest::read_from(&two_pm),
            Err(Error::UnexpectedElement(*PM_ID))
        );

        let late_se = encode_with(&bpm, |out| {
            se.write(&mut *out).unwrap();
            pm.write(&mut *out).unwrap();
            se.write(&mut *out).unwrap();
        });
        assert_eq!(
            BootPolicyManifest::read_from(&late_se),
            Err(Error::UnexpectedElement(*SE_ID))
        );

        let pm_first = encode_with(&bpm, |out| {
            pm.write(&mut *out).unwrap();
            se.write(&mut *out).unwrap();
        });
        assert_eq!(
            BootPolicyManifest::read_from(&pm_first),
            Err(Error::UnexpectedElement(*SE_ID))
        );

        let two_se = encode_with(&bpm, |out| {
            se.write(&mut *out).unwrap();
            se.write(&mut *out).unwrap();
            pm.write(&mut *out).unwrap();
        });
        let (reread, len) = BootPolicyManifest::read_from(&two_se).unwrap();
        assert_eq!(len, two_se.len());
        assert_eq!(reread.se.len(), 2);
        let mut out = Vec::new();
        reread.write_to(&mut out).unwrap();
        assert_eq!(out, two_se);
    }

    #[test]
    fn sign_and_verify() {
        let (mut bpm, _) =
            BootPolicyManifest::read_from(&manifest::bg_boot_policy_manifest())
                .unwrap();
        bpm.set_signature(
            &mut fake::Signer(256),
            Algorithm::RsaSsa,
            Algorithm::Sha256,
        )
        .unwrap();
        bpm.verify(&mut fake::Verifier).unwrap();

        bpm.se[0].ibb_segments[0].size = 0x20000;
        assert!(bpm.verify(&mut fake::Verifier).is_err());
    }
}
