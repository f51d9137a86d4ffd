// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable cryptography traits.
//!
//! Checksumming FMAP areas, validating manifest key hashes and signing or
//! verifying manifests all require cryptographic primitives. This module
//! provides object-safe traits that abstract over those operations, so that
//! the codecs never need to know which backend is doing the work.
//!
//! It is recommended to not import the traits in this module directly, since
//! a lot of them have the same name. Instead, use imports like
//! `use fwimage::crypto::hash;` and partially-qualified names like
//! `hash::Engine`.
//!
//! Software implementations of these traits are provided under the
//! [`ring` module], based on the [`ring`] crate. Their presence is controlled
//! by the `ring` feature flag; some operations require `std` as well.
//!
//! [`ring` module]: ring/index.html

pub mod hash;
pub mod sig;

#[cfg(feature = "ring")]
pub mod ring;

#[cfg(test)]
pub(crate) mod testdata;
