// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Test-only key material.
//!
//! The private key is kept around so that signing can be exercised end to
//! end, rather than only against pre-computed signatures.

/// A plaintext string.
pub const PLAIN_TEXT: &[u8] = include_bytes!("plain.txt");

/// A 2048-bit RSA private key with exponent 65537, in PKCS#8 format.
///
/// Signatures may be created using this key and the following `openssl` call:
/// ```text
/// openssl dgst -sha256 -keyform DER \
///   -sign rsa_2048_private_key.pk8 \
///   -out my_signature.pk1 \
///   plain.txt
/// ```
pub const RSA_2048_PRIV_PKCS8: &[u8] =
    include_bytes!("rsa_2048_private_key.pk8");

/// A PKCS#1 v1.5 SHA-256 signature of `PLAIN_TEXT`, made with
/// `RSA_2048_PRIV_PKCS8`.
pub const RSA_2048_SHA256_SIG_PKCS1: &[u8] =
    include_bytes!("rsa_2048_sha256_sig.pk1");
