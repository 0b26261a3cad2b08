//! Common section header (`EFI_COMMON_SECTION_HEADER` / `EFI_COMMON_SECTION_HEADER2`).
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use crate::{
    err::SectionError,
    pi::section_header::{EXTENDED_SIZE, EXTENDED_SIZE_SENTINEL, SIZE},
    reader::{OutOfBounds, SectionReader},
};

/// The shared prefix of every section record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Absolute offset of the first header byte.
    pub offset: usize,
    /// Declared length of the record including the header.
    pub total_length: usize,
    /// Type tag selecting the payload decoder.
    pub section_type: u8,
    /// 4 for the standard header, 8 when the extended length field is present.
    pub header_length: usize,
}

impl SectionHeader {
    /// Decode a common header at the reader's cursor.
    ///
    /// `bound` is the number of bytes left in the enclosing record; the declared length may not
    /// exceed it. On success the cursor is positioned at the first payload byte.
    pub fn decode(reader: &mut SectionReader<'_>, bound: usize) -> Result<Self, SectionError> {
        let offset = reader.absolute_position();
        let available = bound.min(reader.remaining());
        let truncated = |needed| SectionError::TruncatedHeader { offset, needed, available };

        if available < SIZE {
            return Err(truncated(SIZE));
        }

        let size = reader.read_u24().map_err(|_| truncated(SIZE))?;
        let section_type = reader.read_u8().map_err(|_| truncated(SIZE))?;

        let (total_length, header_length) = if size == EXTENDED_SIZE_SENTINEL {
            if available < EXTENDED_SIZE {
                return Err(truncated(EXTENDED_SIZE));
            }
            let extended_size = reader.read_u32().map_err(|_| truncated(EXTENDED_SIZE))?;
            (extended_size as usize, EXTENDED_SIZE)
        } else {
            (size as usize, SIZE)
        };

        if total_length == 0 || total_length < header_length || total_length > available {
            return Err(SectionError::InvalidLength { offset, section_type, length: total_length, bound: available });
        }

        Ok(Self { offset, total_length, section_type, header_length })
    }

    /// Length of the type-specific payload.
    pub fn payload_length(&self) -> usize {
        self.total_length - self.header_length
    }

    /// Whether the extended 32-bit length field was used.
    pub fn is_extended(&self) -> bool {
        self.header_length == EXTENDED_SIZE
    }

    /// Convert a failed payload read into an error attributed to this section.
    pub(crate) fn truncated(&self, err: OutOfBounds) -> SectionError {
        SectionError::TruncatedPayload {
            offset: self.offset,
            section_type: self.section_type,
            needed: err.needed,
            available: err.available,
        }
    }
}
