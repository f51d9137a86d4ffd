// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Test data of all kinds, ranging from flash maps, to coreboot images, to
//! Intel firmware images with a FIT.

pub mod coreboot;
pub mod fit;
pub mod fmap;
pub mod manifest;
