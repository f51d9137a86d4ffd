// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable storage backends.
//!
//! Firmware images are usually handled as in-memory buffers, but the codecs
//! in this crate only need random access to bytes; this module provides the
//! traits for plugging in something more exotic, such as an SPI flash part.

pub mod flash;
