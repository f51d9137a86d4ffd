// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Algorithm-generic signature traits.
//!
//! Manifest signatures are produced and checked by collaborators implementing
//! these traits; the manifest codecs only shuffle the bytes around.

/// An error returned by a signature operation.
///
/// This type serves as a combination of built-in error types, plus a
/// "custom error" component for surfacing implementation-specific errors
/// that this crate treats as a black box.
///
/// This type has the benefit that, unlike a pure associated type, `From`
/// implementations for error-handling can be implemented on it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error<E = ()> {
    /// The signature did not match the message.
    BadSignature,

    /// The "custom" error type, which is treated as a black box.
    Custom(E),
}

impl<E> Error<E> {
    /// Erases the custom error type from this `Error`, replacing it with `()`.
    pub fn erased(self) -> Error {
        match self {
            Self::BadSignature => Error::BadSignature,
            Self::Custom(_) => Error::Custom(()),
        }
    }
}

/// Convenience type for the error returned by [`Verify::verify()`].
pub type VerifyError<V> = Error<<V as Verify>::Error>;

/// Convenience type for the error returned by [`Sign::sign()`].
pub type SignError<S> = Error<<S as Sign>::Error>;

/// A signature-verification engine, already primed with a key.
///
/// There is no way to extract the key back out of a `Verify` value.
pub trait Verify {
    /// The error returned when an operation fails.
    type Error;

    /// Uses this engine to verify `signature` against `message`.
    ///
    /// `signature` is given in the byte order the verifier expects; manifest
    /// code is responsible for undoing any on-disk byte swapping first.
    ///
    /// If the underlying cryptographic operation succeeds, returns `Ok(())`.
    /// Failures, including signature check failures, are included in the
    /// `Err` variant.
    fn verify(
        &mut self,
        signature: &[u8],
        message: &[u8],
    ) -> Result<(), VerifyError<Self>>;
}

/// An signing engine, already primed with a keypair.
///
/// There is no way to extract the keypair back out of a `Sign` value.
pub trait Sign {
    /// The error returned when an operation fails.
    type Error;

    /// Returns the number of bytes a signature produced by this signer needs.
    fn sig_bytes(&self) -> usize;

    /// Uses this signer to create a signature value for `message`.
    ///
    /// If the underlying cryptographic operation succeeds, returns `Ok(())`.
    /// Failures are included in the `Err` variant.
    fn sign(
        &mut self,
        message: &[u8],
        signature: &mut [u8],
    ) -> Result<(), SignError<Self>>;
}
