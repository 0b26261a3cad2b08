//! Bounds-checked little-endian reader over an immutable byte buffer.
//!
//! `SectionReader` is the cursor every decoder consumes. Reads never go past the end of the
//! backing slice; a failed read reports where it was attempted and leaves the cursor untouched.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use r_efi::efi;
use scroll::{Pread, LE};

/// A read that would have crossed the end of the reader's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    /// Absolute offset at which the read was attempted.
    pub offset: usize,
    /// Bytes the read needed.
    pub needed: usize,
    /// Bytes that were left.
    pub available: usize,
}

/// Cursor over a byte slice.
///
/// `base` is the absolute offset of `data[0]` in the buffer the outermost reader was created over,
/// so offsets reported by sub-readers stay attributable to the original image.
#[derive(Debug)]
pub struct SectionReader<'a> {
    data: &'a [u8],
    offset: usize,
    base: usize,
}

impl<'a> SectionReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0, base: 0 }
    }

    /// Create a reader whose reported offsets start at `base`.
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, offset: 0, base }
    }

    /// Current offset relative to the start of this reader.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Current offset relative to the outermost buffer.
    pub fn absolute_position(&self) -> usize {
        self.base + self.offset
    }

    /// Total length of the underlying slice.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying slice is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the cursor and the end of the slice.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// The whole underlying slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move the cursor to `offset` (relative to this reader). Seeking to the end is allowed.
    pub fn seek(&mut self, offset: usize) -> Result<(), OutOfBounds> {
        if offset > self.data.len() {
            return Err(OutOfBounds { offset: self.base + offset, needed: 0, available: 0 });
        }
        self.offset = offset;
        Ok(())
    }

    /// Advance the cursor by `count` bytes.
    pub fn skip(&mut self, count: usize) -> Result<(), OutOfBounds> {
        self.read_bytes(count).map(|_| ())
    }

    /// Advance to the next multiple of `alignment` (relative to this reader), stopping at the end of
    /// the slice. Returns the number of bytes skipped.
    pub fn align_to(&mut self, alignment: usize) -> usize {
        let target = match self.offset.checked_next_multiple_of(alignment) {
            Some(target) => target.min(self.data.len()),
            None => self.data.len(),
        };
        let skipped = target - self.offset;
        self.offset = target;
        skipped
    }

    fn out_of_bounds(&self, needed: usize) -> OutOfBounds {
        OutOfBounds { offset: self.absolute_position(), needed, available: self.remaining() }
    }

    /// Read a `u8`.
    pub fn read_u8(&mut self) -> Result<u8, OutOfBounds> {
        self.data.gread_with::<u8>(&mut self.offset, LE).map_err(|_| self.out_of_bounds(1))
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, OutOfBounds> {
        self.data.gread_with::<u16>(&mut self.offset, LE).map_err(|_| self.out_of_bounds(2))
    }

    /// Read a little-endian 24-bit value, as used by section and file size fields.
    pub fn read_u24(&mut self) -> Result<u32, OutOfBounds> {
        let bytes = self.read_bytes(3)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, OutOfBounds> {
        self.data.gread_with::<u32>(&mut self.offset, LE).map_err(|_| self.out_of_bounds(4))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64, OutOfBounds> {
        self.data.gread_with::<u64>(&mut self.offset, LE).map_err(|_| self.out_of_bounds(8))
    }

    /// Read a little-endian unsigned integer `width` bytes wide (1 to 8).
    pub fn read_uint(&mut self, width: usize) -> Result<u64, OutOfBounds> {
        if width > 8 {
            return Err(OutOfBounds { offset: self.absolute_position(), needed: width, available: 8 });
        }
        let bytes = self.read_bytes(width)?;
        Ok(bytes.iter().rev().fold(0u64, |value, &byte| (value << 8) | byte as u64))
    }

    /// Read `count` bytes as a borrowed slice.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], OutOfBounds> {
        if count > self.remaining() {
            return Err(self.out_of_bounds(count));
        }
        let bytes = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(bytes)
    }

    /// Peek at the next `count` bytes without moving the cursor.
    pub fn peek_bytes(&self, count: usize) -> Option<&'a [u8]> {
        self.data.get(self.offset..self.offset.checked_add(count)?)
    }

    /// Read `count` UTF-16 code units. The code units are returned as-is; NULs are not treated as
    /// terminators.
    pub fn read_wide_string(&mut self, count: usize) -> Result<Vec<u16>, OutOfBounds> {
        let byte_count = count.checked_mul(2).ok_or_else(|| self.out_of_bounds(usize::MAX))?;
        let bytes = self.read_bytes(byte_count)?;
        Ok(bytes.chunks_exact(2).map(|unit| u16::from_le_bytes([unit[0], unit[1]])).collect())
    }

    /// Read a 16-byte `EFI_GUID`.
    pub fn read_guid(&mut self) -> Result<efi::Guid, OutOfBounds> {
        let bytes = self.read_bytes(16)?;
        let mut guid = [0u8; 16];
        guid.copy_from_slice(bytes);
        Ok(efi::Guid::from_bytes(&guid))
    }

    /// Split off the next `count` bytes as an independent reader and advance past them.
    pub fn sub_reader(&mut self, count: usize) -> Result<SectionReader<'a>, OutOfBounds> {
        let base = self.absolute_position();
        let data = self.read_bytes(count)?;
        Ok(SectionReader::with_base(data, base))
    }
}
