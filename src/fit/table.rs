// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Whole FIT tables.

use core::convert::TryFrom;
use core::fmt;

use crate::fit::offset_to_phys;
use crate::fit::phys_to_offset;
use crate::fit::Entry;
use crate::fit::Error;
use crate::fit::HEADERS_LEN;
use crate::fit::POINTER_OFFSET;
use crate::hardware::flash;
use crate::hardware::flash::Flash;

/// A FIT: a list of entries, header entry first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entries(pub Vec<Entry>);

fn flash_offset(offset: usize) -> Result<u32, Error> {
    match u32::try_from(offset) {
        Ok(offset) => Ok(offset),
        Err(_) => fail!(Error::Flash(flash::Error::OutOfRange)),
    }
}

impl Entries {
    /// Rewrites every entry's headers to be consistent with its data and
    /// with the length of the table.
    ///
    /// This should be called before [`Entries::inject()`].
    pub fn recalculate_headers(&mut self) -> Result<(), Error> {
        let count = self.0.len();
        for entry in &mut self.0 {
            entry.recalculate_headers(count)?;
        }
        Ok(())
    }

    /// Encodes the entry headers table.
    pub fn encode_table(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() * HEADERS_LEN);
        for entry in &self.0 {
            out.extend_from_slice(&entry.headers().to_bytes());
        }
        out
    }

    /// Writes this table into `flash`: the headers at `headers_offset`, the
    /// FIT pointer, and the data of each entry at the offset its address
    /// maps to.
    pub fn inject(
        &self,
        flash: &mut (impl Flash + ?Sized),
        headers_offset: usize,
    ) -> Result<(), Error> {
        let len = flash.size()? as usize;

        let table = self.encode_table();
        flash.program(flash_offset(headers_offset)?, &table)?;

        let pointer = offset_to_phys(headers_offset, len)?;
        let pointer_offset = match len.checked_sub(POINTER_OFFSET) {
            Some(offset) => offset,
            None => {
                return fail!(Error::OutOfBounds {
                    start: 0,
                    end: POINTER_OFFSET,
                    len,
                })
            }
        };
        flash.program(flash_offset(pointer_offset)?, &pointer.to_le_bytes())?;

        for entry in &self.0 {
            if entry.data().is_empty() {
                continue;
            }
            let offset = phys_to_offset(entry.headers().address, len)?;
            trace!("injecting {:#x} bytes at {:#x}", entry.data().len(), offset);
            flash.program(flash_offset(offset)?, entry.data())?;
        }
        flash.flush()?;
        Ok(())
    }
}

impl fmt::Display for Entries {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{:<4} {:<22} {:<18} {:<8} {:<6} {:<5} {}",
            "#", "TYPE", "ADDRESS", "SIZE", "VER", "CV", "SUM"
        )?;
        for (i, entry) in self.0.iter().enumerate() {
            writeln!(f, "{:<4} {}", i, entry)?;
        }
        Ok(())
    }
}
