// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The CBnT boot policy manifest.
//!
//! A CBnT BPM is a header element followed by the elements below, in this
//! order:
//! 1. One or more IBB elements (`__IBBS__`).
//! 2. Optionally, TXT (`__TXTS__`), platform firmware resilience
//!    (`__PFRS__`) and platform configuration data (`__PCDS__`) elements.
//!    These are carried verbatim.
//! 3. Optionally, platform manufacturer data (`__PMDA__`).
//! 4. The signature element (`__PMSG__`).
//!
//! Only IBB elements may repeat. Decoding rejects anything else out of
//! order, since the signature covers the elements as laid out.

use core::fmt;

use crate::crypto::sig;
use crate::io;
use crate::io::Read as _;
use crate::manifest::cbnt::StructInfo;
use crate::manifest::cbnt::STRUCT_INFO_LEN;
use crate::manifest::common::check_reserved;
use crate::manifest::common::len_u16;
use crate::manifest::common::peek_id;
use crate::manifest::Algorithm;
use crate::manifest::Error;
use crate::manifest::HashStructure;
use crate::manifest::IbbSegment;
use crate::manifest::KeySignature;
use crate::manifest::BPMH_ID;
use crate::manifest::PCD_ID;
use crate::manifest::PFR_ID;
use crate::manifest::PMSG_ID;
use crate::manifest::PM_ID;
use crate::manifest::SE_ID;
use crate::manifest::STRUCT_ID_LEN;
use crate::manifest::TXT_ID;

/// The encoded length of a [`Bpmh`].
pub const BPMH_LEN: usize = STRUCT_INFO_LEN + 8;

/// Element IDs after the header, in encoding order.
const ELEMENT_ORDER: [&[u8; STRUCT_ID_LEN]; 6] =
    [SE_ID, TXT_ID, PFR_ID, PCD_ID, PM_ID, PMSG_ID];

/// Encodes an element into a fresh buffer, to measure it.
fn encoded_len(
    write: impl FnOnce(&mut Vec<u8>) -> Result<(), Error>,
) -> Result<u16, Error> {
    let mut buf = Vec::new();
    write(&mut buf)?;
    len_u16(buf.len())
}

/// The boot policy manifest header (`__ACBP__`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bpmh {
    /// The struct info.
    pub struct_info: StructInfo,
    /// The offset of the key-signature pair in the signature element, from
    /// the start of the manifest.
    ///
    /// Recomputed on encode.
    pub key_signature_offset: u16,
    /// The manifest revision.
    pub bpm_revision: u8,
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
            key_signature_offset: r.read_le()?,
            bpm_revision: r.read_le()?,
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
        w.write_le(self.key_signature_offset)?;
        w.write_le(self.bpm_revision)?;
        w.write_le(self.bpm_svn)?;
        w.write_le(self.acm_svn_auth)?;
        w.write_bytes(&self.reserved0)?;
        w.write_le(self.nem_data_stack)?;
        Ok(())
    }
}

/// A list of digests of the same data, made with different algorithms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashList {
    /// The encoded length of the list, including this field and the count.
    ///
    /// Recomputed on encode.
    pub size: u16,
    /// The digests.
    pub hashes: Vec<HashStructure>,
}

impl HashList {
    fn read(r: &mut &[u8]) -> Result<Self, Error> {
        let size = r.read_le()?;
        let count = r.read_le::<u16>()?;
        let mut hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            hashes.push(HashStructure::read(r)?);
        }
        Ok(Self { size, hashes })
    }

    fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        w.write_le(self.size)?;
        w.write_le(len_u16(self.hashes.len())?)?;
        for h in &self.hashes {
            h.write(&mut w)?;
        }
        Ok(())
    }

    /// Recomputes [`HashList::size`].
    pub fn rehash(&mut self) -> Result<(), Error> {
        let len = 4 + self
            .hashes
            .iter()
            .map(HashStructure::encoded_len)
            .sum::<usize>();
        self.size = len_u16(len)?;
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
    /// The base of the low DMA-protected range.
    pub dma_prot_base0: u32,
    /// The limit of the low DMA-protected range.
    pub dma_prot_limit0: u32,
    /// The base of the high DMA-protected range.
    pub dma_prot_base1: u64,
    /// The limit of the high DMA-protected range.
    pub dma_prot_limit1: u64,
    /// The digest of the code run after the IBB.
    pub post_ibb_hash: HashStructure,
    /// The IBB entry point.
    pub ibb_entry_point: u32,
    /// Digests of the IBB segments.
    pub digest_list: HashList,
    /// The digest of the OEM boot block.
    pub obb_hash: HashStructure,
    /// Reserved.
    pub reserved2: [u8; 3],
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
            dma_prot_base0: r.read_le()?,
            dma_prot_limit0: r.read_le()?,
            dma_prot_base1: r.read_le()?,
            dma_prot_limit1: r.read_le()?,
            post_ibb_hash: HashStructure::read(r)?,
            ibb_entry_point: r.read_le()?,
            digest_list: HashList::read(r)?,
            obb_hash: HashStructure::read(r)?,
            reserved2: r.read_array()?,
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
        w.write_le(self.dma_prot_base0)?;
        w.write_le(self.dma_prot_limit0)?;
        w.write_le(self.dma_prot_base1)?;
        w.write_le(self.dma_prot_limit1)?;
        self.post_ibb_hash.write(&mut w)?;
        w.write_le(self.ibb_entry_point)?;
        self.digest_list.write(&mut w)?;
        self.obb_hash.write(&mut w)?;
        w.write_bytes(&self.reserved2)?;
        IbbSegment::write_list(&self.ibb_segments, &mut w)?;
        Ok(())
    }

    fn rehash(&mut self) -> Result<(), Error> {
        self.digest_list.rehash()?;
        let len = encoded_len(|buf| self.write(buf))?;
        self.struct_info.element_size = len;
        Ok(())
    }
}

/// An element carried verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    /// The struct info.
    pub struct_info: StructInfo,
    /// Everything after the struct info.
    pub body: Vec<u8>,
}

impl Element {
    fn read(r: &mut &[u8], id: &[u8; STRUCT_ID_LEN]) -> Result<Self, Error> {
        let struct_info = StructInfo::read(r, id)?;
        let size = struct_info.element_size as usize;
        let body_len = match size.checked_sub(STRUCT_INFO_LEN) {
            Some(len) => len,
            None => return fail!(Error::BadElementSize(*id)),
        };
        let body = r.read_vec(body_len)?;
        Ok(Self { struct_info, body })
    }

    fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        self.struct_info.write(&mut w)?;
        w.write_bytes(&self.body)?;
        Ok(())
    }

    fn rehash(&mut self) -> Result<(), Error> {
        self.struct_info.element_size =
            len_u16(STRUCT_INFO_LEN + self.body.len())?;
        Ok(())
    }
}

/// Platform manufacturer data (`__PMDA__`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowerManagement {
    /// The struct info.
    pub struct_info: StructInfo,
    /// Reserved.
    pub reserved0: [u8; 2],
    /// The opaque data.
    pub data: Vec<u8>,
}

impl PowerManagement {
    fn read(r: &mut &[u8]) -> Result<Self, Error> {
        let struct_info = StructInfo::read(r, PM_ID)?;
        let reserved0 = r.read_array()?;
        check_reserved("PM.Reserved0", &reserved0);
        let len = r.read_le::<u16>()?;
        let data = r.read_vec(len as usize)?;
        Ok(Self {
            struct_info,
            reserved0,
            data,
        })
    }

    fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        self.struct_info.write(&mut w)?;
        w.write_bytes(&self.reserved0)?;
        w.write_le(len_u16(self.data.len())?)?;
        w.write_bytes(&self.data)?;
        Ok(())
    }

    fn rehash(&mut self) -> Result<(), Error> {
        self.struct_info.element_size =
            len_u16(STRUCT_INFO_LEN + 4 + self.data.len())?;
        Ok(())
    }
}

/// The boot policy signature element (`__PMSG__`).
///
/// Its element size is carried as read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pmse {
    /// The struct info.
    pub struct_info: StructInfo,
    /// The boot policy key and its signature over the manifest.
    pub key_signature: KeySignature,
}

/// A CBnT boot policy manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootPolicyManifest {
    /// The header.
    pub bpmh: Bpmh,
    /// The IBB elements; there is at least one.
    pub se: Vec<Se>,
    /// The TXT element, if any.
    pub txt: Option<Element>,
    /// The platform configuration data element, if any.
    pub pcd: Option<Element>,
    /// The platform firmware resilience element, if any.
    pub pfr: Option<Element>,
    /// The platform manufacturer data, if any.
    pub pm: Option<PowerManagement>,
    /// The signature element.
    pub pmse: Pmse,
}

impl BootPolicyManifest {
    /// Decodes a boot policy manifest from the start of `data`, returning it
    /// together with the number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize), Error> {
        let mut r = data;
        let bpmh = Bpmh::read(&mut r)?;

        let mut se = Vec::new();
        let mut txt = None;
        let mut pcd = None;
        let mut pfr = None;
        let mut pm = None;
        let mut last = None;
        let pmse = loop {
            let mut id = [0; STRUCT_ID_LEN];
            match peek_id(r) {
                Some(found) => id.copy_from_slice(found),
                None => return fail!(Error::MissingElement(*PMSG_ID)),
            }
            let rank = match ELEMENT_ORDER.iter().position(|&e| *e == id) {
                Some(rank) => rank,
                None => {
                    return fail!(Error::BadStructId {
                        expected: *PMSG_ID,
                        found: id,
                    })
                }
            };
            if let Some(last) = last {
                check!(
                    rank > last || (rank == last && &id == SE_ID),
                    Error::UnexpectedElement(id)
                );
            }
            last = Some(rank);

            if &id == SE_ID {
                se.push(Se::read(&mut r)?);
            } else if &id == TXT_ID {
                txt = Some(Element::read(&mut r, TXT_ID)?);
            } else if &id == PFR_ID {
                pfr = Some(Element::read(&mut r, PFR_ID)?);
            } else if &id == PCD_ID {
                pcd = Some(Element::read(&mut r, PCD_ID)?);
            } else if &id == PM_ID {
                pm = Some(PowerManagement::read(&mut r)?);
            } else {
                let struct_info = StructInfo::read(&mut r, PMSG_ID)?;
                let offset = data.len() - r.len();
                if offset != bpmh.key_signature_offset as usize {
                    warn!(
                        "BPM signature offset is {:#x}, but the signature is at {:#x}",
                        bpmh.key_signature_offset, offset
                    );
                }
                let key_signature = KeySignature::read(&mut r)?;
                break Pmse {
                    struct_info,
                    key_signature,
                };
            }
        };
        check!(!se.is_empty(), Error::MissingElement(*SE_ID));

        let bpm = Self {
            bpmh,
            se,
            txt,
            pcd,
            pfr,
            pm,
            pmse,
        };
        Ok((bpm, data.len() - r.len()))
    }

    /// Recomputes the fields that describe the rest of the encoding: element
    /// sizes, hash list sizes and the signature offset.
    pub fn rehash(&mut self) -> Result<(), Error> {
        self.bpmh.struct_info.element_size = len_u16(BPMH_LEN)?;
        for se in &mut self.se {
            se.rehash()?;
        }
        for e in self
            .txt
            .iter_mut()
            .chain(self.pfr.iter_mut())
            .chain(self.pcd.iter_mut())
        {
            e.rehash()?;
        }
        if let Some(pm) = &mut self.pm {
            pm.rehash()?;
        }

        let mut buf = Vec::new();
        self.write_elements(&mut buf)?;
        self.bpmh.key_signature_offset =
            len_u16(buf.len() + STRUCT_INFO_LEN)?;
        Ok(())
    }

    fn write_elements(&self, mut w: impl io::Write) -> Result<(), Error> {
        self.bpmh.write(&mut w)?;
        for se in &self.se {
            se.write(&mut w)?;
        }
        for e in self.txt.iter().chain(&self.pfr).chain(&self.pcd) {
            e.write(&mut w)?;
        }
        if let Some(pm) = &self.pm {
            pm.write(&mut w)?;
        }
        Ok(())
    }

    /// Returns the bytes covered by the signature, after rehashing:
    /// everything up to the key-signature pair in the signature element.
    pub fn signed_data(&self) -> Result<Vec<u8>, Error> {
        let mut bpm = self.clone();
        bpm.rehash()?;
        let mut buf = Vec::new();
        bpm.write_elements(&mut buf)?;
        bpm.pmse.struct_info.write(&mut buf)?;
        Ok(buf)
    }

    /// Encodes this manifest, returning the number of bytes written.
    pub fn write_to(&self, mut w: impl io::Write) -> Result<usize, Error> {
        let mut buf = self.signed_data()?;
        self.pmse.key_signature.write(&mut buf)?;
        w.write_bytes(&buf)?;
        Ok(buf.len())
    }

    /// Checks the signature over this manifest.
    pub fn verify(
        &self,
        verifier: &mut (impl sig::Verify + ?Sized),
    ) -> Result<(), Error> {
        self.pmse
            .key_signature
            .verify(verifier, &self.signed_data()?)
    }

    /// Re-signs this manifest, rehashing it first.
    pub fn set_signature(
        &mut self,
        signer: &mut (impl sig::Sign + ?Sized),
        scheme: Algorithm,
        hash_alg: Algorithm,
    ) -> Result<(), Error> {
        self.rehash()?;
        let signed = self.signed_data()?;
        self.pmse
            .key_signature
            .set_signature(signer, scheme, hash_alg, &signed)
    }
}

impl fmt::Display for BootPolicyManifest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let h = &self.bpmh;
        writeln!(
            f,
            "CBnT Boot Policy Manifest (version {:#x})",
            h.struct_info.version
        )?;
        writeln!(f, "  BPMRevision: {:#x}", h.bpm_revision)?;
        writeln!(f, "  BPMSVN: {}", h.bpm_svn)?;
        writeln!(f, "  ACMSVNAuth: {}", h.acm_svn_auth)?;
        writeln!(f, "  NEMDataStack: {:#x}", h.nem_data_stack)?;
        for se in &self.se {
            writeln!(
                f,
                "  IBB set {}: flags={:#x} entry={:#010x}",
                se.set_number, se.flags, se.ibb_entry_point
            )?;
            writeln!(f, "    PostIBBHash: {}", se.post_ibb_hash)?;
            for d in &se.digest_list.hashes {
                writeln!(f, "    Digest: {}", d)?;
            }
            writeln!(f, "    OBBHash: {}", se.obb_hash)?;
            for seg in &se.ibb_segments {
                writeln!(f, "    Segment: {}", seg)?;
            }
        }
        let opaque = [("TXT", &self.txt), ("PFR", &self.pfr), ("PCD", &self.pcd)];
        for &(name, e) in &opaque {
            if let Some(e) = e {
                writeln!(f, "  {}: {} bytes", name, e.body.len())?;
            }
        }
        if let Some(pm) = &self.pm {
            writeln!(f, "  PMDA: {} bytes", pm.data.len())?;
        }
        writeln!(f, "{}", self.pmse.key_signature)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manifest::fake;
    use core::ops::Range;
    use pretty_assertions::assert_eq;
    use testutil::data::manifest;

    #[test]
    fn round_trip() {
        let blob = manifest::cbnt_boot_policy_manifest();
        let (bpm, len) = BootPolicyManifest::read_from(&blob).unwrap();
        assert_eq!(len, blob.len());
        assert_eq!(bpm.bpmh.struct_info.version, 0x23);
        assert_eq!(bpm.se.len(), 1);
        assert_eq!(bpm.se[0].digest_list.hashes.len(), 2);
        assert_eq!(bpm.txt.as_ref().unwrap().body.len(), 20);
        assert_eq!(bpm.pcd.as_ref().unwrap().body.len(), 16);
        assert!(bpm.pfr.is_none());
        assert_eq!(bpm.pm.as_ref().unwrap().data.len(), 6);
        assert_eq!(bpm.pmse.struct_info.element_size, 0);

        let mut out = Vec::new();
        assert_eq!(bpm.write_to(&mut out).unwrap(), blob.len());
        assert_eq!(out, blob);

        let (again, _) = BootPolicyManifest::read_from(&out).unwrap();
        assert_eq!(again.to_string(), bpm.to_string());
        assert!(bpm.to_string().contains("TXT: 20 bytes"));
    }

    #[test]
    fn rehash_follows_edits() {
        let blob = manifest::cbnt_boot_policy_manifest();
        let (mut bpm, _) = BootPolicyManifest::read_from(&blob).unwrap();
        let offset = bpm.bpmh.key_signature_offset as usize;
        assert_eq!(&blob[offset - STRUCT_INFO_LEN..][..8], PMSG_ID);

        bpm.pcd = None;
        bpm.se[0].digest_list.hashes.pop();
        bpm.rehash().unwrap();

        let mut out = Vec::new();
        bpm.write_to(&mut out).unwrap();
        let (reread, _) = BootPolicyManifest::read_from(&out).unwrap();
        assert_eq!(reread, bpm);

        let new_offset = bpm.bpmh.key_signature_offset as usize;
        assert_eq!(&out[new_offset - STRUCT_INFO_LEN..][..8], PMSG_ID);
        // The PCD element and a SHA-384 digest are gone.
        assert_eq!(new_offset, offset - (12 + 16) - (4 + 48));
        assert_eq!(bpm.se[0].digest_list.size, 4 + 4 + 32);
    }

    /// Returns the byte range of the first element with the given ID.
    fn element_range(blob: &[u8], id: &[u8; STRUCT_ID_LEN]) -> Range<usize> {
        let start = blob.windows(STRUCT_ID_LEN).position(|w| w == id).unwrap();
        let size = u16::from_le_bytes([blob[start + 10], blob[start + 11]]);
        start..start + size as usize
    }

    #[test]
    fn pfr_precedes_pcd() {
        let blob = manifest::cbnt_boot_policy_manifest();
        let (mut bpm, _) = BootPolicyManifest::read_from(&blob).unwrap();
        bpm.pfr = Some(Element {
            struct_info: StructInfo::new(PFR_ID, 0x21),
            body: vec![0x5a; 16],
        });

        let mut out = Vec::new();
        bpm.write_to(&mut out).unwrap();
        let pfr = element_range(&out, PFR_ID);
        assert_eq!(pfr.len(), STRUCT_INFO_LEN + 16);
        assert_eq!(element_range(&out, TXT_ID).end, pfr.start);
        assert_eq!(element_range(&out, PCD_ID).start, pfr.end);

        let (reread, len) = BootPolicyManifest::read_from(&out).unwrap();
        assert_eq!(len, out.len());
        let mut again = Vec::new();
        reread.write_to(&mut again).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn repeated_elements() {
        let blob = manifest::cbnt_boot_policy_manifest();
        let splice = |range: Range<usize>| {
            let mut out = blob[..range.end].to_vec();
            out.extend_from_slice(&blob[range.clone()]);
            out.extend_from_slice(&blob[range.end..]);
            out
        };

        let txt = splice(element_range(&blob, TXT_ID));
        assert_eq!(
            BootPolicyManifest::read_from(&txt),
            Err(Error::UnexpectedElement(*TXT_ID))
        );
        let pm = splice(element_range(&blob, PM_ID));
        assert_eq!(
            BootPolicyManifest::read_from(&pm),
            Err(Error::UnexpectedElement(*PM_ID))
        );

        // IBB elements may repeat.
        let se = splice(element_range(&blob, SE_ID));
        let (bpm, len) = BootPolicyManifest::read_from(&se).unwrap();
        assert_eq!(len, se.len());
        assert_eq!(bpm.se.len(), 2);
    }

    #[test]
    fn out_of_order_elements() {
        let blob = manifest::cbnt_boot_policy_manifest();
        let txt = element_range(&blob, TXT_ID);
        let pcd = element_range(&blob, PCD_ID);
        assert_eq!(txt.end, pcd.start);

        let mut swapped = blob[..txt.start].to_vec();
        swapped.extend_from_slice(&blob[pcd.clone()]);
        swapped.extend_from_slice(&blob[txt]);
        swapped.extend_from_slice(&blob[pcd.end..]);
        assert_eq!(
            BootPolicyManifest::read_from(&swapped),
            Err(Error::UnexpectedElement(*TXT_ID))
        );

        let se = element_range(&blob, SE_ID);
        let mut late_se = blob[..se.start].to_vec();
        late_se.extend_from_slice(&blob[se.end..pcd.end]);
        late_se.extend_from_slice(&blob[se.clone()]);
        late_se.extend_from_slice(&blob[pcd.end..]);
        assert_eq!(
            BootPolicyManifest::read_from(&late_se),
            Err(Error::UnexpectedElement(*SE_ID))
        );
    }

    #[test]
    fn bad_element_size() {
        let blob = manifest::cbnt_boot_policy_manifest();
        let (bpm, _) = BootPolicyManifest::read_from(&blob).unwrap();
        let mut bad = bpm.clone();
        bad.txt.as_mut().unwrap().struct_info.element_size = 4;
        let mut buf = Vec::new();
        bad.write_elements(&mut buf).unwrap();
        bad.pmse.struct_info.write(&mut buf).unwrap();
        bad.pmse.key_signature.write(&mut buf).unwrap();
        assert_eq!(
            BootPolicyManifest::read_from(&buf),
            Err(Error::BadElementSize(*TXT_ID))
        );
    }

    #[test]
    fn missing_signature() {
        let blob = manifest::cbnt_boot_policy_manifest();
        let (bpm, _) = BootPolicyManifest::read_from(&blob).unwrap();
        let offset = bpm.bpmh.key_signature_offset as usize;
        assert_eq!(
            BootPolicyManifest::read_from(&blob[..offset - STRUCT_INFO_LEN]),
            Err(Error::MissingElement(*PMSG_ID))
        );
    }

    #[test]
    fn sign_and_verify() {
        let (mut bpm, _) =
            BootPolicyManifest::read_from(&manifest::cbnt_boot_policy_manifest())
                .unwrap();
        bpm.set_signature(
            &mut fake::Signer(384),
            Algorithm::RsaSsa,
            Algorithm::Sha384,
        )
        .unwrap();
        bpm.verify(&mut fake::Verifier).unwrap();

        bpm.bpmh.bpm_svn += 1;
        assert!(bpm.verify(&mut fake::Verifier).is_err());
    }
}
