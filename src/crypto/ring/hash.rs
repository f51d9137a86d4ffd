// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::hash`] based on `ring`.

use core::mem;

use ring::digest;

use crate::crypto::hash;

#[cfg(doc)]
use crate::crypto;

/// A `ring`-based [`hash::Engine`].
pub struct Engine {
    inner: Option<digest::Context>,
}

impl Engine {
    /// Creates a new `Engine`.
    pub fn new() -> Self {
        Self { inner: None }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl hash::Engine for Engine {
    fn supports(&mut self, _: hash::Algo) -> bool {
        true
    }

    fn start_raw(&mut self, algo: hash::Algo) -> Result<(), hash::Error> {
        self.inner = Some(digest::Context::new(match algo {
            hash::Algo::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            hash::Algo::Sha256 => &digest::SHA256,
            hash::Algo::Sha384 => &digest::SHA384,
            hash::Algo::Sha512 => &digest::SHA512,
        }));
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), hash::Error> {
        match &mut self.inner {
            None => return fail!(hash::Error::Idle),
            Some(c) => c.update(data),
        }
        Ok(())
    }

    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), hash::Error> {
        let c = match mem::replace(&mut self.inner, None) {
            None => return fail!(hash::Error::Idle),
            Some(c) => c,
        };
        check!(
            out.len() == c.algorithm().output_len,
            hash::Error::WrongSize
        );
        out.copy_from_slice(c.finish().as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::Algo;
    use crate::crypto::hash::EngineExt as _;
    use pretty_assertions::assert_eq;

    const ABC_SHA1: &[u8] = &[
        0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71,
        0x78, 0x50, 0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
    ];

    const ABC_SHA256: &[u8] = &[
        0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde,
        0x5d, 0xae, 0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c,
        0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    ];

    #[test]
    #[cfg_attr(miri, ignore)]
    fn hash256() {
        let mut e = Engine::new();
        let mut digest = [0; Algo::Sha256.bytes()];

        let mut ctx = e.new_hash(Algo::Sha256).unwrap();
        ctx.write(b"abc").unwrap();
        ctx.finish(&mut digest).unwrap();
        assert_eq!(&digest[..], ABC_SHA256);

        let mut ctx = e.new_hash(Algo::Sha256).unwrap();
        ctx.write(b"a").unwrap();
        ctx.write(b"bc").unwrap();
        assert_eq!(ctx.finish_to_vec().unwrap(), ABC_SHA256);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn sha1() {
        let mut e = Engine::new();
        let digest = e.contiguous_hash(Algo::Sha1, b"abc").unwrap();
        assert_eq!(digest, ABC_SHA1);
    }

    #[test]
    fn idle_and_wrong_size() {
        use crate::crypto::hash::Engine as _;

        let mut e = Engine::new();
        assert_eq!(e.write_raw(b"abc"), Err(hash::Error::Idle));

        e.start_raw(Algo::Sha384).unwrap();
        let mut short = [0; 4];
        assert_eq!(e.finish_raw(&mut short), Err(hash::Error::WrongSize));
    }
}
