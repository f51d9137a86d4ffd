// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Structures shared by both manifest flavours.

use core::convert::TryFrom;
use core::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::crypto::sig;
use crate::io;
use crate::io::Read as _;
use crate::manifest::Error;
use crate::manifest::STRUCT_ID_LEN;
use crate::wire::WireEnum as _;

/// The version of keys, signatures and key-signature pairs.
pub const KEY_SIGNATURE_VERSION: u8 = 0x10;

wire_enum! {
    /// A TPM 2.0 algorithm identifier.
    #[cfg_attr(feature = "serde", derive(Serialize))]
    pub enum Algorithm: u16 {
        /// RSA keys.
        Rsa = 0x0001,
        /// SHA-1.
        Sha1 = 0x0004,
        /// SHA-256.
        Sha256 = 0x000b,
        /// SHA-384.
        Sha384 = 0x000c,
        /// SHA-512.
        Sha512 = 0x000d,
        /// No algorithm.
        Null = 0x0010,
        /// SM3.
        Sm3 = 0x0012,
        /// RSASSA-PKCS1-v1_5 signatures.
        RsaSsa = 0x0014,
        /// RSASSA-PSS signatures.
        RsaPss = 0x0016,
        /// ECDSA signatures.
        Ecdsa = 0x0018,
        /// SM2 signatures.
        Sm2 = 0x001b,
        /// Elliptic curve keys.
        Ecc = 0x0023,
    }
}

impl Algorithm {
    /// Returns the hash function this algorithm names, if it is one this
    /// crate can compute.
    pub fn hash_algo(self) -> Option<hash::Algo> {
        match self {
            Self::Sha1 => Some(hash::Algo::Sha1),
            Self::Sha256 => Some(hash::Algo::Sha256),
            Self::Sha384 => Some(hash::Algo::Sha384),
            Self::Sha512 => Some(hash::Algo::Sha512),
            _ => None,
        }
    }
}

/// Formats a raw algorithm identifier.
pub(crate) fn algorithm_name(alg: u16) -> String {
    match Algorithm::from_wire_value(alg) {
        Some(a) => a.to_string(),
        None => format!("{:#06x}", alg),
    }
}

/// Warns if a reserved field is not zeroed.
pub(crate) fn check_reserved(what: &str, bytes: &[u8]) {
    if bytes.iter().any(|&b| b != 0) {
        warn!("reserved field {} is not zero: {:02x?}", what, bytes);
    }
    #[cfg(not(feature = "log"))]
    let _ = what;
}

/// Converts a length into a `u16` field.
pub(crate) fn len_u16(len: usize) -> Result<u16, Error> {
    match u16::try_from(len) {
        Ok(len) => Ok(len),
        Err(_) => fail!(Error::TooLarge),
    }
}

/// Converts a count into a `u8` field.
pub(crate) fn len_u8(len: usize) -> Result<u8, Error> {
    match u8::try_from(len) {
        Ok(len) => Ok(len),
        Err(_) => fail!(Error::TooLarge),
    }
}

/// Reads a structure ID.
pub(crate) fn read_id(r: &mut &[u8]) -> Result<[u8; STRUCT_ID_LEN], Error> {
    Ok(r.read_array()?)
}

/// Returns the structure ID at the start of `r`, without consuming it.
pub(crate) fn peek_id(r: &[u8]) -> Option<&[u8]> {
    r.get(..STRUCT_ID_LEN)
}

/// A public key.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Key {
    /// The raw key algorithm; see [`Algorithm`].
    pub alg: u16,
    /// The structure version.
    pub version: u8,
    /// The key size, in bits.
    pub key_size: u16,
    /// The key material.
    ///
    /// For RSA, this is a four-byte exponent followed by the modulus; for
    /// ECC, the two coordinates of the public point. Numbers are stored
    /// little-endian.
    pub data: Vec<u8>,
}

impl Key {
    fn data_len(alg: u16, key_size: u16) -> Result<usize, Error> {
        let bytes = key_size as usize / 8;
        match Algorithm::from_wire_value(alg) {
            Some(Algorithm::Rsa) => Ok(4 + bytes),
            Some(Algorithm::Ecc) | Some(Algorithm::Sm2) => Ok(2 * bytes),
            _ => fail!(Error::UnknownAlgorithm(alg)),
        }
    }

    /// Reads a key.
    pub fn read(r: &mut &[u8]) -> Result<Self, Error> {
        let alg = r.read_le()?;
        let version = r.read_le()?;
        let key_size = r.read_le()?;
        if version != KEY_SIGNATURE_VERSION {
            warn!("unexpected key version {:#x}", version);
        }
        let data = r.read_vec(Self::data_len(alg, key_size)?)?;
        Ok(Self {
            alg,
            version,
            key_size,
            data,
        })
    }

    /// Writes this key.
    pub fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        w.write_le(self.alg)?;
        w.write_le(self.version)?;
        w.write_le(self.key_size)?;
        w.write_bytes(&self.data)?;
        Ok(())
    }

    /// Returns the bytes of the key that identify it: the modulus for RSA,
    /// the whole key material otherwise.
    ///
    /// This is what key manifests hash.
    pub fn public_bytes(&self) -> &[u8] {
        match Algorithm::from_wire_value(self.alg) {
            Some(Algorithm::Rsa) => self.data.get(4..).unwrap_or(&[]),
            _ => &self.data,
        }
    }
}

/// A signature.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Signature {
    /// The raw signature scheme; see [`Algorithm`].
    pub scheme: u16,
    /// The structure version.
    pub version: u8,
    /// The size of the signing key, in bits.
    pub key_size: u16,
    /// The raw hash algorithm the signature was computed with.
    pub hash_alg: u16,
    /// The signature, stored little-endian.
    pub data: Vec<u8>,
}

impl Signature {
    fn data_len(scheme: u16, key_size: u16) -> Result<usize, Error> {
        let bytes = key_size as usize / 8;
        match Algorithm::from_wire_value(scheme) {
            Some(Algorithm::RsaSsa) | Some(Algorithm::RsaPss) => Ok(bytes),
            Some(Algorithm::Ecdsa) | Some(Algorithm::Sm2) => Ok(2 * bytes),
            _ => fail!(Error::UnknownAlgorithm(scheme)),
        }
    }

    fn is_rsa(&self) -> bool {
        matches!(
            Algorithm::from_wire_value(self.scheme),
            Some(Algorithm::RsaSsa) | Some(Algorithm::RsaPss)
        )
    }

    /// Returns the signature in the big-endian order signature engines
    /// expect.
    ///
    /// Elliptic curve signatures have each of their two halves reversed.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        if self.is_rsa() {
            out.reverse();
        } else {
            let half = out.len() / 2;
            let (r, s) = out.split_at_mut(half);
            r.reverse();
            s.reverse();
        }
        out
    }
}

/// A public key, together with a signature made with it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct KeySignature {
    /// The structure version.
    pub version: u8,
    /// The key.
    pub key: Key,
    /// The signature.
    pub signature: Signature,
}

impl KeySignature {
    /// Reads a key-signature pair.
    pub fn read(r: &mut &[u8]) -> Result<Self, Error> {
        let version = r.read_le()?;
        if version != KEY_SIGNATURE_VERSION {
            warn!("unexpected key signature version {:#x}", version);
        }
        let key = Key::read(r)?;
        let scheme = r.read_le()?;
        let sig_version = r.read_le()?;
        let key_size = r.read_le()?;
        let hash_alg = r.read_le()?;
        let data = r.read_vec(Signature::data_len(scheme, key_size)?)?;
        Ok(Self {
            version,
            key,
            signature: Signature {
                scheme,
                version: sig_version,
                key_size,
                hash_alg,
                data,
            },
        })
    }

    /// Writes this key-signature pair.
    pub fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        w.write_le(self.version)?;
        self.key.write(&mut w)?;
        let s = &self.signature;
        w.write_le(s.scheme)?;
        w.write_le(s.version)?;
        w.write_le(s.key_size)?;
        w.write_le(s.hash_alg)?;
        w.write_bytes(&s.data)?;
        Ok(())
    }

    /// Checks the signature over `message`.
    pub fn verify(
        &self,
        verifier: &mut (impl sig::Verify + ?Sized),
        message: &[u8],
    ) -> Result<(), Error> {
        let signature = self.signature.to_be_bytes();
        match verifier.verify(&signature, message) {
            Ok(()) => Ok(()),
            Err(e) => fail!(Error::Sig(e.erased())),
        }
    }

    /// Signs `message` with `signer`, replacing the signature.
    ///
    /// The key is left untouched; it is the caller's job to make sure it
    /// matches `signer`.
    pub fn set_signature(
        &mut self,
        signer: &mut (impl sig::Sign + ?Sized),
        scheme: Algorithm,
        hash_alg: Algorithm,
        message: &[u8],
    ) -> Result<(), Error> {
        let mut data = vec![0; signer.sig_bytes()];
        if let Err(e) = signer.sign(message, &mut data) {
            return fail!(Error::Sig(e.erased()));
        }

        let key_bits = match scheme {
            Algorithm::RsaSsa | Algorithm::RsaPss => data.len() * 8,
            Algorithm::Ecdsa | Algorithm::Sm2 => data.len() * 4,
            _ => return fail!(Error::UnknownAlgorithm(scheme.to_wire_value())),
        };
        let mut signature = Signature {
            scheme: scheme.to_wire_value(),
            version: KEY_SIGNATURE_VERSION,
            key_size: len_u16(key_bits)?,
            hash_alg: hash_alg.to_wire_value(),
            data,
        };
        // Engines produce big-endian signatures; the manifest stores them
        // little-endian.
        signature.data = signature.to_be_bytes();
        self.signature = signature;
        Ok(())
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "  Key: {} {} bits",
            algorithm_name(self.key.alg),
            self.key.key_size
        )?;
        write!(
            f,
            "  Signature: {} {} bits, hash {}",
            algorithm_name(self.signature.scheme),
            self.signature.key_size,
            algorithm_name(self.signature.hash_alg)
        )
    }
}

/// A digest, tagged with its algorithm.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HashStructure {
    /// The raw hash algorithm; see [`Algorithm`].
    pub alg: u16,
    /// The digest.
    pub digest: Vec<u8>,
}

impl HashStructure {
    /// Reads a hash structure.
    pub fn read(r: &mut &[u8]) -> Result<Self, Error> {
        let alg = r.read_le()?;
        let len = r.read_le::<u16>()?;
        let digest = r.read_vec(len as usize)?;
        Ok(Self { alg, digest })
    }

    /// Writes this hash structure.
    pub fn write(&self, mut w: impl io::Write) -> Result<(), Error> {
        w.write_le(self.alg)?;
        w.write_le(len_u16(self.digest.len())?)?;
        w.write_bytes(&self.digest)?;
        Ok(())
    }

    /// Returns the encoded length.
    pub fn encoded_len(&self) -> usize {
        4 + self.digest.len()
    }

    /// Checks that this is the digest of `data`.
    pub fn check(
        &self,
        engine: &mut (impl hash::Engine + ?Sized),
        data: &[u8],
    ) -> Result<(), Error> {
        let algo = match Algorithm::from_wire_value(self.alg)
            .and_then(Algorithm::hash_algo)
        {
            Some(algo) => algo,
            None => return fail!(Error::UnsupportedHashAlgorithm(self.alg)),
        };
        let digest = engine.contiguous_hash(algo, data)?;
        check!(digest == self.digest, Error::DigestMismatch);
        Ok(())
    }
}

impl fmt::Display for HashStructure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ", algorithm_name(self.alg))?;
        for b in &self.digest {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// A segment of the initial boot block.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct IbbSegment {
    /// Reserved.
    pub reserved: [u8; 2],
    /// Segment flags.
    pub flags: u16,
    /// The physical base address.
    pub base: u32,
    /// The length of the segment.
    pub size: u32,
}

impl IbbSegment {
    /// Reads a `u8`-counted list of segments.
    pub(crate) fn read_list(r: &mut &[u8]) -> Result<Vec<Self>, Error> {
        let count = r.read_le::<u8>()?;
        let mut segments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let segment = Self {
                reserved: r.read_array()?,
                flags: r.read_le()?,
                base: r.read_le()?,
                size: r.read_le()?,
            };
            check_reserved("IBBSegment.Reserved", &segment.reserved);
            segments.push(segment);
        }
        Ok(segments)
    }

    /// Writes a `u8`-counted list of segments.
    pub(crate) fn write_list(
        segments: &[Self],
        mut w: impl io::Write,
    ) -> Result<(), Error> {
        w.write_le(len_u8(segments.len())?)?;
        for s in segments {
            w.write_bytes(&s.reserved)?;
            w.write_le(s.flags)?;
            w.write_le(s.base)?;
            w.write_le(s.size)?;
        }
        Ok(())
    }
}

impl fmt::Display for IbbSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "base={:#010x} size={:#x} flags={:#06x}",
            self.base, self.size, self.flags
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manifest::fake;
    use pretty_assertions::assert_eq;
    use testutil::data::manifest;

    #[test]
    fn key_signature_round_trip() {
        let blob = manifest::key_signature(2048, 0x0b, 0x42);
        let mut r = &blob[..];
        let ks = KeySignature::read(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(ks.key.alg, 0x0001);
        assert_eq!(ks.key.key_size, 2048);
        assert_eq!(ks.key.data.len(), 4 + 256);
        assert_eq!(ks.key.public_bytes().len(), 256);
        assert_eq!(ks.signature.data.len(), 256);

        let mut out = Vec::new();
        ks.write(&mut out).unwrap();
        assert_eq!(out, blob);
    }

    #[test]
    fn length_fields() {
        assert_eq!(len_u16(0xffff), Ok(0xffff));
        assert_eq!(len_u16(0x1_0000), Err(Error::TooLarge));
        assert_eq!(len_u8(0xff), Ok(0xff));
        assert_eq!(len_u8(0x100), Err(Error::TooLarge));
    }

    #[test]
    fn unknown_key_algorithm() {
        let mut blob = manifest::key_signature(2048, 0x0b, 0x42);
        blob[1] = 0x77;
        assert_eq!(
            KeySignature::read(&mut &blob[..]),
            Err(Error::UnknownAlgorithm(0x0077))
        );
    }

    #[test]
    fn sign_then_verify() {
        let blob = manifest::key_signature(2048, 0x0b, 0x42);
        let mut ks = KeySignature::read(&mut &blob[..]).unwrap();

        let message = b"boot policy";
        ks.set_signature(
            &mut fake::Signer(256),
            Algorithm::RsaSsa,
            Algorithm::Sha384,
            message,
        )
        .unwrap();
        assert_eq!(ks.signature.key_size, 2048);
        assert_eq!(ks.signature.hash_alg, 0x000c);
        // Stored little-endian: the message ends up at the back, reversed.
        assert_eq!(&ks.signature.data[256 - 3..], b"oob");

        ks.verify(&mut fake::Verifier, message).unwrap();
        assert_eq!(
            ks.verify(&mut fake::Verifier, b"boot policy!"),
            Err(Error::Sig(sig::Error::BadSignature))
        );
    }

    #[test]
    fn ecdsa_halves() {
        let sig = Signature {
            scheme: Algorithm::Ecdsa.to_wire_value(),
            version: KEY_SIGNATURE_VERSION,
            key_size: 16,
            hash_alg: Algorithm::Sha256.to_wire_value(),
            data: vec![1, 2, 3, 4],
        };
        assert_eq!(sig.to_be_bytes(), vec![2, 1, 4, 3]);
    }

    #[cfg(feature = "ring")]
    #[test]
    fn hash_structure_check() {
        let mut engine = crate::crypto::ring::hash::Engine::new();
        let digest = engine
            .contiguous_hash(hash::Algo::Sha256, b"abc")
            .unwrap();
        let hs = HashStructure {
            alg: Algorithm::Sha256.to_wire_value(),
            digest,
        };
        hs.check(&mut engine, b"abc").unwrap();
        assert_eq!(hs.check(&mut engine, b"abd"), Err(Error::DigestMismatch));

        let sm3 = HashStructure {
            alg: Algorithm::Sm3.to_wire_value(),
            digest: vec![0; 32],
        };
        assert_eq!(
            sm3.check(&mut engine, b"abc"),
            Err(Error::UnsupportedHashAlgorithm(0x0012))
        );
        assert!(hs.to_string().starts_with("Sha256 ba7816bf"));
    }
}
