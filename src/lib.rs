// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `fwimage` parses, validates and re-serializes the binary containers found
//! in x86 firmware images.
//!
//! Four formats are supported:
//! - [FMAP](fmap/index.html), the flash area map that names byte ranges of a
//!   flash image.
//! - [CBFS](cbfs/index.html), the coreboot file system living inside the
//!   `COREBOOT` FMAP area.
//! - The Intel [Firmware Interface Table](fit/index.html), located through a
//!   pointer just below the reset vector.
//! - Intel Boot Guard and CBnT [Key and Boot Policy
//!   Manifests](manifest/index.html), referenced by FIT entries.
//!
//! Every codec decodes from an untrusted byte buffer into an owned model and
//! encodes back into a byte buffer, such that an unmodified model reproduces
//! its input exactly. No decoder panics on malformed input; failures are
//! reported through per-module error types.
//!
//! Cryptographic hashing and signing, as well as LZMA/LZ4 decompression, are
//! provided by the caller through traits; see the [`crypto` module] and
//! [`cbfs::compress`].
//!
//! [`crypto` module]: crypto/index.html

#![deny(missing_docs)]
#![deny(unsafe_code)]

#[cfg(feature = "log")]
extern crate log as __raw_log;

#[macro_use]
mod debug;

#[macro_use]
pub mod wire;

pub mod cbfs;
pub mod crypto;
pub mod fit;
pub mod fmap;
pub mod hardware;
pub mod io;
pub mod manifest;

#[cfg(feature = "serde")]
mod serde;

/// Decodes a NUL-padded name field, replacing invalid UTF-8.
///
/// Everything from the first NUL byte onwards is ignored.
pub(crate) fn cstr_lossy(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Rounds `offset` up to the next multiple of `align`, which must be a power
/// of two.
pub(crate) fn align_up(offset: usize, align: usize) -> Option<usize> {
    Some(offset.checked_add(align - 1)? & !(align - 1))
}
