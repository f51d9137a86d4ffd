// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! I/O interfaces, in lieu of [`std::io`].
//!
//! These functions and traits are mostly intended for manipulating byte
//! buffers: every codec in this crate decodes out of a `&[u8]` and encodes
//! into something implementing [`Write`].

use core::fmt;

pub mod cursor;
pub mod endian;
pub mod read;
pub mod write;

pub use cursor::Cursor;
pub use read::Read;
pub use write::StdWrite;
pub use write::Write;

/// A generic, low-level I/O error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that some underlying buffer has been completely used up,
    /// either for reading from or writing to.
    ///
    /// When reading, this is the "unexpected end of input" condition.
    BufferExhausted,

    /// Indicates that an unspecified, internal failure occurred.
    Internal,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BufferExhausted => write!(f, "unexpected end of buffer"),
            Self::Internal => write!(f, "internal I/O failure"),
        }
    }
}
