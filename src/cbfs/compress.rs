// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Compression of CBFS file bodies.
//!
//! No codec is bundled; callers provide one through [`Decompress`].

#[cfg(feature = "serde")]
use serde::Serialize;

wire_enum! {
    /// A CBFS compression algorithm.
    #[cfg_attr(feature = "serde", derive(Serialize))]
    pub enum Compression: u32 {
        /// The body is stored as-is.
        None = 0,
        /// LZMA.
        Lzma = 1,
        /// LZ4, in the legacy frame format.
        Lz4 = 2,
    }
}

impl Compression {
    /// Returns the name `cbfstool` uses for this algorithm.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lzma => "LZMA",
            Self::Lz4 => "LZ4",
        }
    }
}

/// Formats a raw compression identifier for listings.
pub(crate) fn describe(algo: Option<u32>) -> String {
    use crate::wire::WireEnum as _;
    match algo.map(|a| (a, Compression::from_wire_value(a))) {
        None => Compression::None.tool_name().to_string(),
        Some((_, Some(c))) => c.tool_name().to_string(),
        Some((a, None)) => format!("{:#x}", a),
    }
}

/// An error returned by a [`Decompress`] implementation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecompressError;

/// A decompression engine.
///
/// This is never asked to handle [`Compression::None`].
pub trait Decompress {
    /// Decompresses `data`, which was compressed with `algo`.
    fn decompress(
        &mut self,
        algo: Compression,
        data: &[u8],
    ) -> Result<Vec<u8>, DecompressError>;
}

// Ensure Decompress is object-safe.
impl dyn Decompress {}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn descriptions() {
        assert_eq!(describe(None), "none");
        assert_eq!(describe(Some(1)), "LZMA");
        assert_eq!(describe(Some(2)), "LZ4");
        assert_eq!(describe(Some(7)), "0x7");
    }
}
