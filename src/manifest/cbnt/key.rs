// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The CBnT key manifest.

use core::fmt;

use enumflags2::bitflags;
use enumflags2::BitFlags;

use crate::crypto::hash;
use crate::crypto::sig;
use crate::io;
use crate::io::Read as _;
use crate::manifest::cbnt::StructInfo;
use crate::manifest::cbnt::STRUCT_INFO_LEN;
use crate::manifest::common::algorithm_name;
use crate::manifest::common::check_reserved;
use crate::manifest::common::len_u16;
use crate::manifest::Algorithm;
use crate::manifest::Error;
use crate::manifest::HashStructure;
use crate::manifest::KeySignature;
use crate::manifest::KM_ID;

/// What a key hash in a [`KeyManifest`] may be used for.
#[bitflags]
#[repr(u64)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Usage {
    /// Signing boot policy manifests.
    Bpm = 1 << 0,
    /// Signing FIT patch manifests.
    FitPatch = 1 << 1,
    /// Signing ACM manifests.
    Acm = 1 << 2,
    /// Signing SDEV manifests.
    Sdev = 1 << 3,
}

/// A key digest, tagged with what the key may be used for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyHash {
    /// The raw usage bits; see [`Usage`].
    pub usage: u64,
    /// The digest of the key.
    pub digest: HashStructure,
}

impl KeyHash {
    /// Returns the usages this crate knows about.
    pub fn known_usages(&self) -> BitFlags<Usage> {
        BitFlags::from_bits_truncate(self.usage)
    }

    fn encoded_len(&self) -> usize {
        8 + self.digest.encoded_len()
    }
}

/// A CBnT key manifest (`__KEYM__`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyManifest {
    /// The struct info. Its element size is carried as read.
    pub struct_info: StructInfo,
    /// The offset of the key-signature pair, from the start of the
    /// manifest.
    ///
    /// Recomputed on encode.
    pub key_manifest_signature_offset: u16,
    /// Reserved.
    pub reserved2: [u8; 3],
    /// The manifest revision.
    pub revision: u8,
    /// The security version number.
    pub km_svn: u8,
    /// The manifest ID.
    pub km_id: u8,
    /// The raw algorithm of the OEM public key hash.
    pub pub_key_hash_alg: u16,
    /// Digests of the keys this manifest vouches for.
    pub hashes: Vec<KeyHash>,
    /// The OEM key and its signature over this manifest.
    pub key_signature: KeySignature,
}

impl KeyManifest {
    /// Decodes a key manifest from the start of `data`, returning it
    /// together with the number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize), Error> {
        let mut r = data;
        let struct_info = StructInfo::read(&mut r, KM_ID)?;
        let key_manifest_signature_offset = r.read_le()?;
        let reserved2 = r.read_array()?;
        check_reserved("KM.Reserved2", &reserved2);
        let revision = r.read_le()?;
        let km_svn = r.read_le()?;
        let km_id = r.read_le()?;
        let pub_key_hash_alg = r.read_le()?;

        let count = r.read_le::<u16>()?;
        let mut hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            hashes.push(KeyHash {
                usage: r.read_le()?,
                digest: HashStructure::read(&mut r)?,
            });
        }

        let offset = data.len() - r.len();
        if offset != key_manifest_signature_offset as usize {
            warn!(
                "KM signature offset is {:#x}, but the signature is at {:#x}",
                key_manifest_signature_offset, offset
            );
        }
        let key_signature = KeySignature::read(&mut r)?;

        let km = Self {
            struct_info,
            key_manifest_signature_offset,
            reserved2,
            revision,
            km_svn,
            km_id,
            pub_key_hash_alg,
            hashes,
            key_signature,
        };
        Ok((km, data.len() - r.len()))
    }

    /// Recomputes the fields that describe the rest of the encoding.
    pub fn rehash(&mut self) -> Result<(), Error> {
        let len = STRUCT_INFO_LEN
            + 2 // KeyManifestSignatureOffset.
            + 3 // Reserved2.
            + 3 // Revision, KMSVN, KMID.
            + 2 // PubKeyHashAlg.
            + 2 // KeyCount.
            + self.hashes.iter().map(KeyHash::encoded_len).sum::<usize>();
        self.key_manifest_signature_offset = len_u16(len)?;
        Ok(())
    }

    fn write_signed_part(&self, mut w: impl io::Write) -> Result<(), Error> {
        self.struct_info.write(&mut w)?;
        w.write_le(self.key_manifest_signature_offset)?;
        w.write_bytes(&self.reserved2)?;
        w.write_le(self.revision)?;
        w.write_le(self.km_svn)?;
        w.write_le(self.km_id)?;
        w.write_le(self.pub_key_hash_alg)?;
        w.write_le(len_u16(self.hashes.len())?)?;
        for h in &self.hashes {
            w.write_le(h.usage)?;
            h.digest.write(&mut w)?;
        }
        Ok(())
    }

    /// Returns the bytes covered by the signature, after rehashing.
    pub fn signed_data(&self) -> Result<Vec<u8>, Error> {
        let mut km = self.clone();
        km.rehash()?;
        let mut buf = Vec::new();
        km.write_signed_part(&mut buf)?;
        Ok(buf)
    }

    /// Encodes this manifest, returning the number of bytes written.
    pub fn write_to(&self, mut w: impl io::Write) -> Result<usize, Error> {
        let mut buf = self.signed_data()?;
        self.key_signature.write(&mut buf)?;
        w.write_bytes(&buf)?;
        Ok(buf.len())
    }

    /// Checks that `bpm_key` is the key this manifest vouches for boot
    /// policy manifests.
    pub fn validate_bpm_key(
        &self,
        bpm_key: &KeySignature,
        engine: &mut (impl hash::Engine + ?Sized),
    ) -> Result<(), Error> {
        let hash = match self
            .hashes
            .iter()
            .find(|h| h.known_usages().contains(Usage::Bpm))
        {
            Some(h) => h,
            None => return fail!(Error::NoBpmKeyHash),
        };
        hash.digest.check(engine, bpm_key.key.public_bytes())
    }

    /// Checks the signature over this manifest.
    pub fn verify(
        &self,
        verifier: &mut (impl sig::Verify + ?Sized),
    ) -> Result<(), Error> {
        self.key_signature.verify(verifier, &self.signed_data()?)
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
        self.key_signature
            .set_signature(signer, scheme, hash_alg, &signed)
    }
}

impl fmt::Display for KeyManifest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "CBnT Key Manifest (version {:#x})",
            self.struct_info.version
        )?;
        writeln!(f, "  Revision: {:#x}", self.revision)?;
        writeln!(f, "  KMSVN: {}", self.km_svn)?;
        writeln!(f, "  KMID: {:#x}", self.km_id)?;
        writeln!(
            f,
            "  PubKeyHashAlg: {}",
            algorithm_name(self.pub_key_hash_alg)
        )?;
        for h in &self.hashes {
            writeln!(f, "  Hash ({:?}): {}", h.known_usages(), h.digest)?;
        }
        writeln!(f, "{}", self.key_signature)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manifest::fake;
    use pretty_assertions::assert_eq;
    use testutil::data::manifest;

    #[test]
    fn round_trip() {
        let blob = manifest::cbnt_key_manifest(&[0x33; 48]);
        let (km, len) = KeyManifest::read_from(&blob).unwrap();
        assert_eq!(len, blob.len());
        assert_eq!(km.struct_info.version, 0x21);
        assert_eq!(km.hashes.len(), 2);
        assert_eq!(km.hashes[0].known_usages(), BitFlags::from(Usage::Bpm));
        assert_eq!(km.hashes[1].known_usages(), BitFlags::from(Usage::Acm));
        assert_eq!(km.hashes[0].digest.digest, vec![0x33; 48]);
        assert_eq!(km.key_signature.key.key_size, 3072);

        let mut out = Vec::new();
        km.write_to(&mut out).unwrap();
        assert_eq!(out, blob);

        let (again, _) = KeyManifest::read_from(&out).unwrap();
        assert_eq!(again.to_string(), km.to_string());
        assert!(km.to_string().contains("KMSVN: 2"));
    }

    #[test]
    fn signature_offset_is_rehashed() {
        let blob = manifest::cbnt_key_manifest(&[0x33; 48]);
        let (mut km, _) = KeyManifest::read_from(&blob).unwrap();
        let offset = km.key_manifest_signature_offset;
        assert_eq!(blob[offset as usize], 0x10);

        km.key_manifest_signature_offset = 0;
        let mut out = Vec::new();
        km.write_to(&mut out).unwrap();
        assert_eq!(out, blob);

        km.hashes.pop();
        km.rehash().unwrap();
        assert_eq!(km.key_manifest_signature_offset, offset - 8 - 4 - 48);
    }

    #[test]
    fn wrong_version() {
        let mut blob = manifest::cbnt_key_manifest(&[0x33; 48]);
        blob[8] = 0x1f;
        assert!(matches!(
            KeyManifest::read_from(&blob),
            Err(Error::BadVersion { version: 0x1f, .. })
        ));
    }

    #[test]
    fn sign_and_verify() {
        let blob = manifest::cbnt_key_manifest(&[0x33; 48]);
        let (mut km, _) = KeyManifest::read_from(&blob).unwrap();
        km.set_signature(
            &mut fake::Signer(384),
            Algorithm::RsaPss,
            Algorithm::Sha384,
        )
        .unwrap();
        km.verify(&mut fake::Verifier).unwrap();

        km.km_svn += 1;
        assert!(km.verify(&mut fake::Verifier).is_err());
    }

    #[cfg(feature = "ring")]
    #[test]
    fn bpm_key_hash() {
        use crate::crypto::hash::EngineExt as _;
        use crate::crypto::ring;
        use crate::manifest::BootPolicyManifest;
        use crate::manifest::KeyManifest as AnyKeyManifest;

        let (bpm, _) = BootPolicyManifest::read_from(
            &manifest::cbnt_boot_policy_manifest(),
        )
        .unwrap();
        let mut engine = ring::hash::Engine::new();
        let digest = engine
            .contiguous_hash(
                hash::Algo::Sha384,
                bpm.key_signature().key.public_bytes(),
            )
            .unwrap();

        let (km, _) =
            AnyKeyManifest::read_from(&manifest::cbnt_key_manifest(&digest))
                .unwrap();
        km.validate_bpm_key(&bpm, &mut engine).unwrap();

        let (other, _) =
            AnyKeyManifest::read_from(&manifest::cbnt_key_manifest(&[0; 48]))
                .unwrap();
        assert_eq!(
            other.validate_bpm_key(&bpm, &mut engine),
            Err(Error::DigestMismatch)
        );

        let (mut no_bpm, _) =
            KeyManifest::read_from(&manifest::cbnt_key_manifest(&digest))
                .unwrap();
        no_bpm.hashes.remove(0);
        assert_eq!(
            no_bpm.validate_bpm_key(bpm.key_signature(), &mut engine),
            Err(Error::NoBpmKeyHash)
        );
    }
}
