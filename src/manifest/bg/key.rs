// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The Boot Guard key manifest.

use core::fmt;

use crate::crypto::hash;
use crate::crypto::sig;
use crate::io;
use crate::io::Read as _;
use crate::manifest::bg::StructInfo;
use crate::manifest::Algorithm;
use crate::manifest::Error;
use crate::manifest::HashStructure;
use crate::manifest::KeySignature;
use crate::manifest::KM_ID;

/// A Boot Guard key manifest (`__KEYM__`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyManifest {
    /// The struct info.
    pub struct_info: StructInfo,
    /// The manifest format version.
    pub km_version: u8,
    /// The security version number.
    pub km_svn: u8,
    /// The manifest ID.
    pub km_id: u8,
    /// The digest of the key that signs the boot policy manifest.
    pub bp_key: HashStructure,
    /// The OEM key and its signature over this manifest.
    pub key_signature: KeySignature,
}

impl KeyManifest {
    /// Decodes a key manifest from the start of `data`, returning it
    /// together with the number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize), Error> {
        let mut r = data;
        let km = Self {
            struct_info: StructInfo::read(&mut r, KM_ID)?,
            km_version: r.read_le()?,
            km_svn: r.read_le()?,
            km_id: r.read_le()?,
            bp_key: HashStructure::read(&mut r)?,
            key_signature: KeySignature::read(&mut r)?,
        };
        Ok((km, data.len() - r.len()))
    }

    fn write_signed_part(&self, mut w: impl io::Write) -> Result<(), Error> {
        self.struct_info.write(&mut w)?;
        w.write_le(self.km_version)?;
        w.write_le(self.km_svn)?;
        w.write_le(self.km_id)?;
        self.bp_key.write(&mut w)?;
        Ok(())
    }

    /// Encodes this manifest, returning the number of bytes written.
    pub fn write_to(&self, mut w: impl io::Write) -> Result<usize, Error> {
        let mut buf = self.signed_data()?;
        self.key_signature.write(&mut buf)?;
        w.write_bytes(&buf)?;
        Ok(buf.len())
    }

    /// Returns the bytes covered by the signature: everything before the
    /// key-signature pair.
    pub fn signed_data(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        self.write_signed_part(&mut buf)?;
        Ok(buf)
    }

    /// Checks that `bpm_key` is the key this manifest vouches for.
    pub fn validate_bpm_key(
        &self,
        bpm_key: &KeySignature,
        engine: &mut (impl hash::Engine + ?Sized),
    ) -> Result<(), Error> {
        self.bp_key.check(engine, bpm_key.key.public_bytes())
    }

    /// Checks the signature over this manifest.
    pub fn verify(
        &self,
        verifier: &mut (impl sig::Verify + ?Sized),
    ) -> Result<(), Error> {
        self.key_signature.verify(verifier, &self.signed_data()?)
    }

    /// Re-signs this manifest.
    pub fn set_signature(
        &mut self,
        signer: &mut (impl sig::Sign + ?Sized),
        scheme: Algorithm,
        hash_alg: Algorithm,
    ) -> Result<(), Error> {
        let signed = self.signed_data()?;
        self.key_signature
            .set_signature(signer, scheme, hash_alg, &signed)
    }
}

impl fmt::Display for KeyManifest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Boot Guard Key Manifest (version {:#x})",
            self.struct_info.version
        )?;
        writeln!(f, "  KMVersion: {:#x}", self.km_version)?;
        writeln!(f, "  KMSVN: {}", self.km_svn)?;
        writeln!(f, "  KMID: {:#x}", self.km_id)?;
        writeln!(f, "  BPKey: {}", self.bp_key)?;
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
        let mut blob = manifest::bg_key_manifest(&[0x5a; 32]);
        let len = blob.len();
        blob.extend_from_slice(b"trailing");

        let (km, consumed) = KeyManifest::read_from(&blob).unwrap();
        assert_eq!(consumed, len);
        assert_eq!(km.struct_info.version, 0x10);
        assert_eq!(km.km_svn, 1);
        assert_eq!(km.bp_key.digest, vec![0x5a; 32]);

        let mut out = Vec::new();
        assert_eq!(km.write_to(&mut out).unwrap(), len);
        assert_eq!(out, &blob[..len]);

        let (again, _) = KeyManifest::read_from(&out).unwrap();
        assert_eq!(again.to_string(), km.to_string());
        assert!(km.to_string().contains("KMSVN: 1"));
    }

    #[test]
    fn wrong_id_and_version() {
        let mut blob = manifest::bg_key_manifest(&[0; 32]);
        blob[2] = b'X';
        assert!(matches!(
            KeyManifest::read_from(&blob),
            Err(Error::BadStructId { .. })
        ));

        let mut blob = manifest::bg_key_manifest(&[0; 32]);
        blob[8] = 0x21;
        assert_eq!(
            KeyManifest::read_from(&blob),
            Err(Error::BadVersion {
                id: *KM_ID,
                version: 0x21,
            })
        );
    }

    #[test]
    fn truncated() {
        let blob = manifest::bg_key_manifest(&[0; 32]);
        assert_eq!(
            KeyManifest::read_from(&blob[..blob.len() - 1]),
            Err(Error::Io(io::Error::BufferExhausted))
        );
    }

    #[test]
    fn sign_and_verify() {
        let blob = manifest::bg_key_manifest(&[0; 32]);
        let (mut km, _) = KeyManifest::read_from(&blob).unwrap();
        assert!(km.verify(&mut fake::Verifier).is_err());

        km.set_signature(
            &mut fake::Signer(256),
            Algorithm::RsaSsa,
            Algorithm::Sha256,
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
        use crate::manifest::bg::BootPolicyManifest;

        let (bpm, _) =
            BootPolicyManifest::read_from(&manifest::bg_boot_policy_manifest())
                .unwrap();
        let bpm_key = &bpm.pmsg.key_signature;

        let mut engine = crate::crypto::ring::hash::Engine::new();
        let digest = engine
            .contiguous_hash(hash::Algo::Sha256, bpm_key.key.public_bytes())
            .unwrap();
        let (km, _) =
            KeyManifest::read_from(&manifest::bg_key_manifest(&digest)).unwrap();
        km.validate_bpm_key(bpm_key, &mut engine).unwrap();

        let (km, _) =
            KeyManifest::read_from(&manifest::bg_key_manifest(&[0; 32])).unwrap();
        assert_eq!(
            km.validate_bpm_key(bpm_key, &mut engine),
            Err(Error::DigestMismatch)
        );
    }

    #[cfg(feature = "ring")]
    #[test]
    #[cfg_attr(miri, ignore)]
    fn sign_with_rsa_key() {
        use crate::crypto::ring::rsa;
        use crate::crypto::testdata;

        let mut signer = rsa::Signer::from_pkcs8(
            testdata::RSA_2048_PRIV_PKCS8,
            hash::Algo::Sha256,
        )
        .unwrap();
        let (n, e) = signer.public_components();

        let blob = manifest::bg_key_manifest(&[0x5a; 32]);
        let (mut km, _) = KeyManifest::read_from(&blob).unwrap();
        for (dst, src) in km.key_signature.key.data[4..]
            .iter_mut()
            .zip(n.iter().rev())
        {
            *dst = *src;
        }
        km.set_signature(&mut signer, Algorithm::RsaSsa, Algorithm::Sha256)
            .unwrap();

        let mut out = Vec::new();
        km.write_to(&mut out).unwrap();
        assert_eq!(out.len(), blob.len());
        let (km, _) = KeyManifest::read_from(&out).unwrap();

        let mut modulus = km.key_signature.key.public_bytes().to_vec();
        modulus.reverse();
        assert_eq!(modulus, n);
        let mut verifier = rsa::Verifier::new(
            modulus.into(),
            e.into(),
            rsa::Padding::Pkcs1,
            hash::Algo::Sha256,
        )
        .unwrap();
        km.verify(&mut verifier).unwrap();

        let mut tampered = km.clone();
        tampered.km_svn += 1;
        assert!(tampered.verify(&mut verifier).is_err());
    }
}
