// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::sig`] for RSA, based on `ring`.
//!
//! Requires the `std` feature flag to be enabled.

use ring::error::Unspecified;
use ring::signature::KeyPair as _;
use ring::signature::RsaPublicKeyComponents;

use crate::crypto::hash;
use crate::crypto::sig;

#[cfg(doc)]
use crate::crypto;

/// An RSA signature padding scheme.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Padding {
    /// PKCS#1 v1.5 padding (`TPM_ALG_RSASSA`).
    Pkcs1,
    /// PSS padding (`TPM_ALG_RSAPSS`).
    Pss,
}

/// A `ring`-based RSA [`sig::Verify`].
pub struct Verifier {
    key: RsaPublicKeyComponents<Box<[u8]>>,
    params: &'static ring::signature::RsaParameters,
}

impl Verifier {
    /// Creates a new `Verifier` with the given modulus and exponent, both of
    /// which should be given in big-endian.
    ///
    /// Returns `None` if there is no `ring` verification algorithm for the
    /// requested padding and digest.
    pub fn new(
        modulus: Box<[u8]>,
        exponent: Box<[u8]>,
        padding: Padding,
        digest: hash::Algo,
    ) -> Option<Self> {
        use ring::signature::*;
        let params = match (padding, digest) {
            (Padding::Pkcs1, hash::Algo::Sha256) => &RSA_PKCS1_2048_8192_SHA256,
            (Padding::Pkcs1, hash::Algo::Sha384) => &RSA_PKCS1_2048_8192_SHA384,
            (Padding::Pkcs1, hash::Algo::Sha512) => &RSA_PKCS1_2048_8192_SHA512,
            (Padding::Pss, hash::Algo::Sha256) => &RSA_PSS_2048_8192_SHA256,
            (Padding::Pss, hash::Algo::Sha384) => &RSA_PSS_2048_8192_SHA384,
            (Padding::Pss, hash::Algo::Sha512) => &RSA_PSS_2048_8192_SHA512,
            _ => return None,
        };
        Some(Self {
            key: RsaPublicKeyComponents {
                n: modulus,
                e: exponent,
            },
            params,
        })
    }
}

impl sig::Verify for Verifier {
    type Error = Unspecified;

    fn verify(
        &mut self,
        signature: &[u8],
        message: &[u8],
    ) -> Result<(), sig::Error<Unspecified>> {
        self.key
            .verify(self.params, message, signature)
            .map_err(|_| sig::Error::BadSignature)
    }
}

/// A `ring`-based RSA PKCS#1 v1.5 [`sig::Sign`].
pub struct Signer {
    keypair: ring::signature::RsaKeyPair,
    encoding: &'static dyn ring::signature::RsaEncoding,
}

impl Signer {
    /// Creates a new `Signer` from the given PKCS#8-encoded private key.
    ///
    /// This function will return `None` if parsing fails or if `digest` has
    /// no PKCS#1 encoding in `ring`.
    pub fn from_pkcs8(pkcs8: &[u8], digest: hash::Algo) -> Option<Self> {
        use ring::signature::*;
        let encoding: &'static dyn RsaEncoding = match digest {
            hash::Algo::Sha256 => &RSA_PKCS1_SHA256,
            hash::Algo::Sha384 => &RSA_PKCS1_SHA384,
            hash::Algo::Sha512 => &RSA_PKCS1_SHA512,
            hash::Algo::Sha1 => return None,
        };
        let keypair = RsaKeyPair::from_pkcs8(pkcs8).ok()?;
        Some(Self { keypair, encoding })
    }

    /// Returns the modulus and public exponent of the signing key, both
    /// big-endian and without leading zeroes.
    pub fn public_components(&self) -> (Vec<u8>, Vec<u8>) {
        let key = self.keypair.public_key();
        (
            key.modulus().big_endian_without_leading_zero().to_vec(),
            key.exponent().big_endian_without_leading_zero().to_vec(),
        )
    }
}

impl sig::Sign for Signer {
    type Error = Unspecified;

    fn sig_bytes(&self) -> usize {
        self.keypair.public_modulus_len()
    }

    fn sign(
        &mut self,
        message: &[u8],
        signature: &mut [u8],
    ) -> Result<(), sig::Error<Unspecified>> {
        let rng = ring::rand::SystemRandom::new();
        self.keypair
            .sign(self.encoding, &rng, message, signature)
            .map_err(sig::Error::Custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sig::Sign as _;
    use crate::crypto::sig::Verify as _;
    use crate::crypto::testdata;
    use pretty_assertions::assert_eq;

    #[test]
    fn unsupported_digest() {
        let v = Verifier::new(
            vec![0xc5; 256].into(),
            vec![1, 0, 1].into(),
            Padding::Pkcs1,
            hash::Algo::Sha1,
        );
        assert!(v.is_none());
        assert!(Signer::from_pkcs8(b"not a key", hash::Algo::Sha256).is_none());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn garbage_signature_is_rejected() {
        let mut v = Verifier::new(
            vec![0xc5; 256].into(),
            vec![1, 0, 1].into(),
            Padding::Pss,
            hash::Algo::Sha256,
        )
        .unwrap();
        assert_eq!(
            v.verify(&[0x11; 256], b"__ACBP__"),
            Err(sig::Error::BadSignature)
        );
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn pkcs1_sign_and_verify() {
        let mut signer =
            Signer::from_pkcs8(testdata::RSA_2048_PRIV_PKCS8, hash::Algo::Sha256)
                .unwrap();
        assert_eq!(signer.sig_bytes(), 256);

        let (n, e) = signer.public_components();
        assert_eq!(n.len(), 256);
        assert_eq!(e, vec![1, 0, 1]);
        let mut verifier =
            Verifier::new(n.into(), e.into(), Padding::Pkcs1, hash::Algo::Sha256)
                .unwrap();
        verifier
            .verify(testdata::RSA_2048_SHA256_SIG_PKCS1, testdata::PLAIN_TEXT)
            .unwrap();

        let mut signature = vec![0; signer.sig_bytes()];
        signer.sign(testdata::PLAIN_TEXT, &mut signature).unwrap();
        // PKCS#1 v1.5 signing is deterministic.
        assert_eq!(signature, testdata::RSA_2048_SHA256_SIG_PKCS1.to_vec());
        verifier.verify(&signature, testdata::PLAIN_TEXT).unwrap();

        signature[0] ^= 1;
        assert_eq!(
            verifier.verify(&signature, testdata::PLAIN_TEXT),
            Err(sig::Error::BadSignature)
        );
    }
}
