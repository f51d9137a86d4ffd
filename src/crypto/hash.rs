// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Cryptographic hashing.
//!
//! In general, users of this module should be pulling in [`EngineExt`],
//! which adds functions to [`Engine`] for more ergonomic usage, but which
//! would otherwise make it object-unsafe.

use core::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// A cryptographic hashing algorithm.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Algo {
    /// 160-bit SHA-1; still found in older Boot Guard key manifests.
    Sha1,
    /// 256-bit SHA-2.
    Sha256,
    /// 384-bit SHA-2.
    Sha384,
    /// 512-bit SHA-2.
    Sha512,
}

impl Algo {
    /// The number of bits in a digest of this strength.
    #[inline]
    pub const fn bits(self) -> usize {
        match self {
            Self::Sha1 => 160,
            Self::Sha256 => 256,
            Self::Sha384 => 384,
            Self::Sha512 => 512,
        }
    }

    /// The number of bytes in a digest of this strength.
    #[inline]
    pub const fn bytes(self) -> usize {
        self.bits() / 8
    }
}

/// An error returned by a hashing function.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates that the wrong size of digest was provided to
    /// [`Engine::finish_raw()`].
    WrongSize,

    /// Indicates that the engine was idle, but a write or finish
    /// operation was requested.
    Idle,

    /// Indicates that the engine cannot compute the requested algorithm.
    Unsupported,

    /// Indicates an unspecified, internal error.
    Unspecified,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::WrongSize => write!(f, "wrong digest size"),
            Error::Idle => write!(f, "hash engine is idle"),
            Error::Unsupported => write!(f, "unsupported hash algorithm"),
            Error::Unspecified => write!(f, "unspecified hash failure"),
        }
    }
}

/// A hashing engine, which maintains the state for one digest.
///
/// Callers should not use the `raw` API directly; [`Hasher`] is a type-safe
/// wrapper that manages a session with an `Engine`.
///
/// Implementers only need to provide the "raw" form of the API; the remaining
/// functions are convenience helpers.
pub trait Engine {
    /// Returns whether this engine supports the given algorithm.
    fn supports(&mut self, algo: Algo) -> bool;

    /// Begins a new hashing operation, discarding any previous state.
    fn start_raw(&mut self, algo: Algo) -> Result<(), Error>;

    /// Adds `data` to the hashing state.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Completes the hashing operation.
    ///
    /// Calling this function multiple times will have an unspecified effect.
    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), Error>;
}

// Ensure Engine is object-safe.
impl dyn Engine {}

/// Helpers for creating a [`Hasher`] from an [`Engine`].
#[extend::ext(name = EngineExt)]
pub impl<E: Engine + ?Sized> E {
    /// Begins a new hashing operation.
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn new_hash(&mut self, algo: Algo) -> Result<Hasher<&mut Self>, Error> {
        if !self.supports(algo) {
            return Err(Error::Unsupported);
        }
        self.start_raw(algo)?;
        Ok(Hasher { engine: self, algo })
    }

    /// Convenience helper for hashing a contiguous memory region.
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn contiguous_hash(&mut self, algo: Algo, buf: &[u8]) -> Result<Vec<u8>, Error> {
        let mut h = self.new_hash(algo)?;
        h.write(buf)?;
        h.finish_to_vec()
    }
}

/// A helper for managing a hashing operation with an [`Engine`].
///
/// Users should prefer to use this instead of calling [`Engine`]'s raw API
/// directly.
pub struct Hasher<E> {
    engine: E,
    algo: Algo,
}

impl<E: Engine + ?Sized> Hasher<&mut E> {
    /// Adds `data` to the hashing state.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.write_raw(data)
    }

    /// Completes the hashing operation, writing the result to `out`.
    pub fn finish(self, out: &mut [u8]) -> Result<(), Error> {
        self.engine.finish_raw(out)
    }

    /// Completes the hashing operation, returning a freshly allocated digest.
    pub fn finish_to_vec(self) -> Result<Vec<u8>, Error> {
        let mut out = vec![0; self.algo.bytes()];
        self.engine.finish_raw(&mut out)?;
        Ok(out)
    }
}
