//! Error types and conversions for the firmware volume decoding crate.
//!
//! Every variant carries enough context (offset, declared type, declared length) to attribute the
//! failure to a specific record in the image. Offsets are relative to the start of the buffer the
//! active [`SectionReader`](crate::reader::SectionReader) was created over; for sections nested
//! inside a transformed (e.g. decompressed) payload that is the start of the transformed buffer.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use core::fmt;

use r_efi::efi;

use crate::transform::Algorithm;

/// Error definitions for section, file and volume decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// Fewer bytes remain than the minimum (or extended) common section header.
    TruncatedHeader {
        /// Offset of the candidate section.
        offset: usize,
        /// Header bytes required.
        needed: usize,
        /// Bytes remaining in the enclosing record.
        available: usize,
    },
    /// The reader ran out of data before the section payload was fully consumed.
    TruncatedPayload {
        /// Offset of the section.
        offset: usize,
        /// Declared section type.
        section_type: u8,
        /// Payload bytes required.
        needed: usize,
        /// Payload bytes available.
        available: usize,
    },
    /// The declared length is zero, smaller than its header, or exceeds the enclosing record.
    InvalidLength {
        /// Offset of the record.
        offset: usize,
        /// Declared section type.
        section_type: u8,
        /// Declared length.
        length: usize,
        /// Upper bound imposed by the enclosing record.
        bound: usize,
    },
    /// A wide-character payload does not hold a whole number of code units.
    OddPayloadLength {
        /// Offset of the section.
        offset: usize,
        /// Declared section type.
        section_type: u8,
        /// Payload length in bytes.
        length: usize,
    },
    /// The transform collaborator does not know the algorithm needed to expand a container.
    UnsupportedAlgorithm {
        /// Offset of the container section.
        offset: usize,
        /// Algorithm identifier found in the container header.
        algorithm: AlgorithmId,
    },
    /// The transform collaborator recognized the algorithm but rejected the data.
    TransformFailed {
        /// Offset of the container section.
        offset: usize,
        /// Algorithm identifier found in the container header.
        algorithm: AlgorithmId,
    },
    /// Container sections are nested deeper than the configured cap.
    RecursionLimitExceeded {
        /// Offset of the container that would exceed the cap.
        offset: usize,
        /// Configured maximum depth.
        max_depth: usize,
    },
    /// An FFS file header is malformed.
    InvalidFileHeader {
        /// Offset of the file.
        offset: usize,
        /// What is wrong with the header.
        reason: &'static str,
    },
    /// An FFS file is not in the `DATA_VALID` state.
    InvalidFileState {
        /// Offset of the file.
        offset: usize,
        /// Raw state byte.
        state: u8,
    },
    /// An FFS file header or data checksum does not match.
    FileChecksumMismatch {
        /// Offset of the file.
        offset: usize,
    },
    /// A firmware volume header is malformed.
    InvalidVolumeHeader {
        /// Offset of the volume.
        offset: usize,
        /// What is wrong with the header.
        reason: &'static str,
    },
    /// The firmware volume uses a file system other than FFS2/FFS3.
    UnsupportedFileSystem {
        /// Offset of the volume.
        offset: usize,
        /// File system GUID from the volume header.
        guid: efi::Guid,
    },
}

/// Owned form of [`Algorithm`] suitable for storing in an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmId {
    /// Compression section with the given `compression_type`.
    Compression(u8),
    /// GUID-defined section with the given section definition GUID.
    GuidDefined(efi::Guid),
}

impl From<&Algorithm<'_>> for AlgorithmId {
    fn from(value: &Algorithm<'_>) -> Self {
        match value {
            Algorithm::Compression(compression_type) => AlgorithmId::Compression(*compression_type),
            Algorithm::GuidDefined { guid, .. } => AlgorithmId::GuidDefined(*guid),
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmId::Compression(compression_type) => write!(f, "compression type {:#04x}", compression_type),
            AlgorithmId::GuidDefined(guid) => write!(f, "guid {}", crate::pi::guid_to_string(guid)),
        }
    }
}

impl SectionError {
    /// Offset of the record the error is attributed to.
    pub fn offset(&self) -> usize {
        match self {
            SectionError::TruncatedHeader { offset, .. }
            | SectionError::TruncatedPayload { offset, .. }
            | SectionError::InvalidLength { offset, .. }
            | SectionError::OddPayloadLength { offset, .. }
            | SectionError::UnsupportedAlgorithm { offset, .. }
            | SectionError::TransformFailed { offset, .. }
            | SectionError::RecursionLimitExceeded { offset, .. }
            | SectionError::InvalidFileHeader { offset, .. }
            | SectionError::InvalidFileState { offset, .. }
            | SectionError::FileChecksumMismatch { offset }
            | SectionError::InvalidVolumeHeader { offset, .. }
            | SectionError::UnsupportedFileSystem { offset, .. } => *offset,
        }
    }
}

impl fmt::Display for SectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionError::TruncatedHeader { offset, needed, available } => {
                write!(f, "truncated section header at {:#x}: need {} bytes, {} available", offset, needed, available)
            }
            SectionError::TruncatedPayload { offset, section_type, needed, available } => write!(
                f,
                "truncated payload in section type {:#04x} at {:#x}: need {} bytes, {} available",
                section_type, offset, needed, available
            ),
            SectionError::InvalidLength { offset, section_type, length, bound } => write!(
                f,
                "invalid length {:#x} for record type {:#04x} at {:#x} (bound {:#x})",
                length, section_type, offset, bound
            ),
            SectionError::OddPayloadLength { offset, section_type, length } => write!(
                f,
                "odd payload length {} in wide-string section type {:#04x} at {:#x}",
                length, section_type, offset
            ),
            SectionError::UnsupportedAlgorithm { offset, algorithm } => {
                write!(f, "unsupported {} in container section at {:#x}", algorithm, offset)
            }
            SectionError::TransformFailed { offset, algorithm } => {
                write!(f, "{} rejected the data of container section at {:#x}", algorithm, offset)
            }
            SectionError::RecursionLimitExceeded { offset, max_depth } => {
                write!(f, "container section at {:#x} nests deeper than {} levels", offset, max_depth)
            }
            SectionError::InvalidFileHeader { offset, reason } => {
                write!(f, "invalid FFS file header at {:#x}: {}", offset, reason)
            }
            SectionError::InvalidFileState { offset, state } => {
                write!(f, "FFS file at {:#x} is not DATA_VALID (state {:#04x})", offset, state)
            }
            SectionError::FileChecksumMismatch { offset } => write!(f, "FFS file checksum mismatch at {:#x}", offset),
            SectionError::InvalidVolumeHeader { offset, reason } => {
                write!(f, "invalid firmware volume header at {:#x}: {}", offset, reason)
            }
            SectionError::UnsupportedFileSystem { offset, guid } => write!(
                f,
                "firmware volume at {:#x} uses unsupported file system {}",
                offset,
                crate::pi::guid_to_string(guid)
            ),
        }
    }
}

impl core::error::Error for SectionError {}

impl From<SectionError> for efi::Status {
    fn from(value: SectionError) -> Self {
        match value {
            SectionError::TruncatedHeader { .. } | SectionError::TruncatedPayload { .. } => efi::Status::BUFFER_TOO_SMALL,
            SectionError::UnsupportedAlgorithm { .. } | SectionError::UnsupportedFileSystem { .. } => {
                efi::Status::UNSUPPORTED
            }
            SectionError::RecursionLimitExceeded { .. } => efi::Status::ABORTED,
            SectionError::InvalidLength { .. }
            | SectionError::OddPayloadLength { .. }
            | SectionError::TransformFailed { .. }
            | SectionError::InvalidFileHeader { .. }
            | SectionError::InvalidFileState { .. }
            | SectionError::FileChecksumMismatch { .. }
            | SectionError::InvalidVolumeHeader { .. } => efi::Status::VOLUME_CORRUPTED,
        }
    }
}
