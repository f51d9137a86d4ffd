// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of crypto traits, using the [`ring`] crate.
//!
//! This module provides software implementations of [`crypto`] traits suitable
//! for host-side tooling. In particular, some submodules have dependencies on
//! the `std` feature flag.
//!
//! Types in this module, much like those in [`crypto`], should not be imported
//! directly. Instead, names such as `ring::rsa::Verifier` should be used
//! instead.
//!
//! The [`ring` warranty disclaimer] applies to this module as well.
//!
//! [`ring` warranty disclaimer]: https://github.com/briansmith/ring/blob/main/README.md

pub mod hash;
#[cfg(feature = "std")]
pub mod rsa;

#[cfg(doc)]
use crate::crypto;

pub use ring::error::Unspecified;
