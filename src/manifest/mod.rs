// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Intel Boot Guard and CBnT manifests.
//!
//! Boot Guard (BG, manifest versions `0x10..=0x1f`) and Converged Boot
//! Guard and TXT (CBnT, versions `0x20` and up) both describe a boot trust
//! chain with two signed manifests, referenced from the [FIT]:
//! - The *Key Manifest* (KM) carries the hash of the key that signs the
//!   boot policy, and is signed by the OEM root key.
//! - The *Boot Policy Manifest* (BPM) describes the initial boot block
//!   and the policies around it.
//!
//! # Wire Format
//!
//! Every manifest is a sequence of *elements*, each starting with a
//! "struct info" header:
//! ```ignore
//! struct StructInfo {
//!     id: [u8; 8],        // e.g. "__KEYM__".
//!     version: u8,
//!     // CBnT only:
//!     variable0: u8,
//!     element_size: u16,  // Length of the whole element.
//! }
//! ```
//! All integers are little-endian. Variable-length parts are prefixed with
//! their length or count. Some fields are *derived*: they describe the rest
//! of the encoding (e.g., the offset of the signature), and encoders always
//! recompute them rather than trusting the stored value.
//!
//! The [`KeyManifest`] and [`BootPolicyManifest`] enums pick the right
//! flavour by peeking at the version of the first struct info.
//!
//! [FIT]: ../fit/index.html

use core::fmt;

use crate::crypto::hash;
use crate::crypto::sig;
use crate::io;

mod common;
pub use common::*;

pub mod bg;
pub mod cbnt;

/// The length of a structure ID.
pub const STRUCT_ID_LEN: usize = 8;

/// The ID of a key manifest.
pub const KM_ID: &[u8; STRUCT_ID_LEN] = b"__KEYM__";

/// The ID of a boot policy manifest header.
pub const BPMH_ID: &[u8; STRUCT_ID_LEN] = b"__ACBP__";

/// The ID of an IBB (initial boot block) element.
pub const SE_ID: &[u8; STRUCT_ID_LEN] = b"__IBBS__";

/// The ID of a platform manufacturer data element.
pub const PM_ID: &[u8; STRUCT_ID_LEN] = b"__PMDA__";

/// The ID of a boot policy signature element.
pub const PMSG_ID: &[u8; STRUCT_ID_LEN] = b"__PMSG__";

/// The ID of a TXT element (CBnT only).
pub const TXT_ID: &[u8; STRUCT_ID_LEN] = b"__TXTS__";

/// The ID of a platform configuration data element (CBnT only).
pub const PCD_ID: &[u8; STRUCT_ID_LEN] = b"__PCDS__";

/// The ID of a platform firmware resilience element (CBnT only).
pub const PFR_ID: &[u8; STRUCT_ID_LEN] = b"__PFRS__";

/// An error returned by a manifest operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates an error in a low-level [`io`] type.
    Io(io::Error),

    /// Indicates that an error occured inside of a hashing engine.
    Hash(hash::Error),

    /// Indicates that a signature operation failed.
    Sig(sig::Error),

    /// Indicates that a structure had an unexpected ID.
    BadStructId {
        /// The ID that was expected.
        expected: [u8; STRUCT_ID_LEN],
        /// The ID that was found.
        found: [u8; STRUCT_ID_LEN],
    },

    /// Indicates that a structure had a version this flavour does not
    /// understand.
    BadVersion {
        /// The structure ID.
        id: [u8; STRUCT_ID_LEN],
        /// The version found.
        version: u8,
    },

    /// Indicates that a manifest version is neither Boot Guard nor CBnT.
    UnknownFlavour(u8),

    /// Indicates that an element's declared size is smaller than its header.
    BadElementSize([u8; STRUCT_ID_LEN]),

    /// Indicates that a required element was missing.
    MissingElement([u8; STRUCT_ID_LEN]),

    /// Indicates that an element was repeated, or appeared after an
    /// element that must follow it.
    UnexpectedElement([u8; STRUCT_ID_LEN]),

    /// Indicates that an algorithm identifier was not valid where it was
    /// found.
    UnknownAlgorithm(u16),

    /// Indicates that a hash algorithm cannot be computed.
    UnsupportedHashAlgorithm(u16),

    /// Indicates that a key manifest carries no hash for the boot policy
    /// signing key.
    NoBpmKeyHash,

    /// Indicates that a stored digest did not match the computed one.
    DigestMismatch,

    /// Indicates that a length did not fit in its encoded field.
    TooLarge,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<hash::Error> for Error {
    fn from(e: hash::Error) -> Self {
        Self::Hash(e)
    }
}

impl From<sig::Error> for Error {
    fn from(e: sig::Error) -> Self {
        Self::Sig(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let id = |id: &[u8]| String::from_utf8_lossy(id).into_owned();
        match self {
            Error::Io(e) => write!(f, "manifest: {}", e),
            Error::Hash(e) => write!(f, "manifest: {}", e),
            Error::Sig(sig::Error::BadSignature) => {
                write!(f, "manifest signature does not match")
            }
            Error::Sig(sig::Error::Custom(())) => {
                write!(f, "manifest signature engine failed")
            }
            Error::BadStructId { expected, found } => write!(
                f,
                "expected structure {:?}, found {:?}",
                id(expected),
                id(found)
            ),
            Error::BadVersion { id: i, version } => {
                write!(f, "unsupported version {:#x} of {:?}", version, id(i))
            }
            Error::UnknownFlavour(v) => {
                write!(f, "unknown manifest version {:#x}", v)
            }
            Error::BadElementSize(i) => {
                write!(f, "bad element size for {:?}", id(i))
            }
            Error::MissingElement(i) => write!(f, "missing element {:?}", id(i)),
            Error::UnexpectedElement(i) => {
                write!(f, "unexpected element {:?}", id(i))
            }
            Error::UnknownAlgorithm(a) => write!(f, "unknown algorithm {:#x}", a),
            Error::UnsupportedHashAlgorithm(a) => {
                write!(f, "unsupported hash algorithm {:#x}", a)
            }
            Error::NoBpmKeyHash => {
                write!(f, "key manifest has no boot policy key hash")
            }
            Error::DigestMismatch => write!(f, "digest mismatch"),
            Error::TooLarge => write!(f, "value too large for its field"),
        }
    }
}

/// A manifest flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavour {
    /// Boot Guard 1.0.
    BootGuard,
    /// Converged Boot Guard and TXT.
    Cbnt,
}

impl Flavour {
    /// Detects the flavour of the manifest at the start of `data`, from the
    /// version byte of its first struct info.
    pub fn detect(data: &[u8]) -> Result<Self, Error> {
        let version = match data.get(STRUCT_ID_LEN) {
            Some(&v) => v,
            None => return fail!(Error::Io(io::Error::BufferExhausted)),
        };
        match version {
            0x10..=0x1f => Ok(Self::BootGuard),
            0x20..=0xff => Ok(Self::Cbnt),
            _ => fail!(Error::UnknownFlavour(version)),
        }
    }
}

/// A key manifest of either flavour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyManifest {
    /// A Boot Guard key manifest.
    Bg(bg::KeyManifest),
    /// A CBnT key manifest.
    Cbnt(cbnt::KeyManifest),
}

impl KeyManifest {
    /// Decodes a key manifest of either flavour, returning it together with
    /// the number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize), Error> {
        Ok(match Flavour::detect(data)? {
            Flavour::BootGuard => {
                let (km, len) = bg::KeyManifest::read_from(data)?;
                (Self::Bg(km), len)
            }
            Flavour::Cbnt => {
                let (km, len) = cbnt::KeyManifest::read_from(data)?;
                (Self::Cbnt(km), len)
            }
        })
    }

    /// Encodes this manifest, returning the number of bytes written.
    pub fn write_to(&self, w: impl io::Write) -> Result<usize, Error> {
        match self {
            Self::Bg(km) => km.write_to(w),
            Self::Cbnt(km) => km.write_to(w),
        }
    }

    /// Returns the flavour of this manifest.
    pub fn flavour(&self) -> Flavour {
        match self {
            Self::Bg(_) => Flavour::BootGuard,
            Self::Cbnt(_) => Flavour::Cbnt,
        }
    }

    /// Returns the key and signature over this manifest.
    pub fn key_signature(&self) -> &KeySignature {
        match self {
            Self::Bg(km) => &km.key_signature,
            Self::Cbnt(km) => &km.key_signature,
        }
    }

    /// Checks that `bpm` is signed with the key this manifest vouches for.
    pub fn validate_bpm_key(
        &self,
        bpm: &BootPolicyManifest,
        engine: &mut (impl hash::Engine + ?Sized),
    ) -> Result<(), Error> {
        let bpm_key = bpm.key_signature();
        match self {
            Self::Bg(km) => km.validate_bpm_key(bpm_key, engine),
            Self::Cbnt(km) => km.validate_bpm_key(bpm_key, engine),
        }
    }
}

impl fmt::Display for KeyManifest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bg(km) => km.fmt(f),
            Self::Cbnt(km) => km.fmt(f),
        }
    }
}

/// A boot policy manifest of either flavour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootPolicyManifest {
    /// A Boot Guard boot policy manifest.
    Bg(bg::BootPolicyManifest),
    /// A CBnT boot policy manifest.
    Cbnt(cbnt::BootPolicyManifest),
}

impl BootPolicyManifest {
    /// Decodes a boot policy manifest of either flavour, returning it
    /// together with the number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize), Error> {
        Ok(match Flavour::detect(data)? {
            Flavour::BootGuard => {
                let (bpm, len) = bg::BootPolicyManifest::read_from(data)?;
                (Self::Bg(bpm), len)
            }
            Flavour::Cbnt => {
                let (bpm, len) = cbnt::BootPolicyManifest::read_from(data)?;
                (Self::Cbnt(bpm), len)
            }
        })
    }

    /// Encodes this manifest, returning the number of bytes written.
    pub fn write_to(&self, w: impl io::Write) -> Result<usize, Error> {
        match self {
            Self::Bg(bpm) => bpm.write_to(w),
            Self::Cbnt(bpm) => bpm.write_to(w),
        }
    }

    /// Returns the flavour of this manifest.
    pub fn flavour(&self) -> Flavour {
        match self {
            Self::Bg(_) => Flavour::BootGuard,
            Self::Cbnt(_) => Flavour::Cbnt,
        }
    }

    /// Returns the key and signature over this manifest.
    pub fn key_signature(&self) -> &KeySignature {
        match self {
            Self::Bg(bpm) => &bpm.pmsg.key_signature,
            Self::Cbnt(bpm) => &bpm.pmse.key_signature,
        }
    }
}

impl fmt::Display for BootPolicyManifest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bg(bpm) => bpm.fmt(f),
            Self::Cbnt(bpm) => bpm.fmt(f),
        }
    }
}

/// Stand-in signature engines for tests.
#[cfg(test)]
pub(crate) mod fake {
    use crate::crypto::sig;

    /// Folds `message` into `len` bytes with XOR.
    pub fn fold(message: &[u8], len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        for (i, b) in message.iter().enumerate() {
            out[i % len] ^= b;
        }
        out
    }

    /// Produces `fold(message)` as the big-endian signature.
    pub struct Signer(pub usize);

    impl sig::Sign for Signer {
        type Error = ();
        fn sig_bytes(&self) -> usize {
            self.0
        }
        fn sign(
            &mut self,
            message: &[u8],
            signature: &mut [u8],
        ) -> Result<(), sig::SignError<Self>> {
            signature.copy_from_slice(&fold(message, self.0));
            Ok(())
        }
    }

    /// Accepts signatures made by [`Signer`].
    pub struct Verifier;

    impl sig::Verify for Verifier {
        type Error = ();
        fn verify(
            &mut self,
            signature: &[u8],
            message: &[u8],
        ) -> Result<(), sig::VerifyError<Self>> {
            if signature == &fold(message, signature.len())[..] {
                Ok(())
            } else {
                Err(sig::Error::BadSignature)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use testutil::data::manifest;

    #[test]
    fn flavours() {
        assert_eq!(
            Flavour::detect(&manifest::bg_key_manifest(&[0; 32])).unwrap(),
            Flavour::BootGuard
        );
        assert_eq!(
            Flavour::detect(&manifest::cbnt_key_manifest(&[0; 48])).unwrap(),
            Flavour::Cbnt
        );
        assert_eq!(
            Flavour::detect(b"__KEYM__\x01"),
            Err(Error::UnknownFlavour(1))
        );
        assert_eq!(
            Flavour::detect(b"__KEYM__"),
            Err(Error::Io(io::Error::BufferExhausted))
        );
    }

    #[test]
    fn dispatch_and_round_trip() {
        for blob in &[
            manifest::bg_key_manifest(&[0; 32]),
            manifest::cbnt_key_manifest(&[0; 48]),
        ] {
            let (km, len) = KeyManifest::read_from(blob).unwrap();
            assert_eq!(len, blob.len());
            let mut out = Vec::new();
            assert_eq!(km.write_to(&mut out).unwrap(), blob.len());
            assert_eq!(&out, blob);
        }

        for blob in &[
            manifest::bg_boot_policy_manifest(),
            manifest::cbnt_boot_policy_manifest(),
        ] {
            let (bpm, len) = BootPolicyManifest::read_from(blob).unwrap();
            assert_eq!(len, blob.len());
            let mut out = Vec::new();
            assert_eq!(bpm.write_to(&mut out).unwrap(), blob.len());
            assert_eq!(&out, blob);
        }
    }

    #[test]
    fn error_messages() {
        let e = Error::BadStructId {
            expected: *KM_ID,
            found: *BPMH_ID,
        };
        assert_eq!(
            e.to_string(),
            "expected structure \"__KEYM__\", found \"__ACBP__\""
        );
    }
}
