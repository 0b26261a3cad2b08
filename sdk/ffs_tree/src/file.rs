//! Firmware File System (FFS) File Support
//!
//! Decodes `EFI_FFS_FILE_HEADER` / `EFI_FFS_FILE_HEADER2` records and the section stream they
//! carry.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{borrow::Cow, string::String, vec::Vec};

use log::debug;
use r_efi::efi;

use crate::{
    config::FileErrorPolicy,
    err::SectionError,
    pi::{
        self,
        file::{attributes, r#type, state, FILE_CHECKSUM_UNUSED, HEADER2_SIZE, HEADER_SIZE},
    },
    reader::SectionReader,
    section::{Section, SectionKind},
    tree::FirmwareObject,
    walker::FfsDecoder,
};

/// A decoded FFS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    offset: usize,
    name: efi::Guid,
    file_type: u8,
    attributes: u8,
    state: u8,
    size: usize,
    header_length: usize,
    content: Vec<u8>,
    sections: Vec<Section>,
    error: Option<SectionError>,
}

impl File {
    /// Offset of the file header in the buffer it was decoded from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The file name GUID from the FFS header.
    pub fn name(&self) -> efi::Guid {
        self.name
    }

    /// The raw FFS file type byte.
    pub fn file_type(&self) -> u8 {
        self.file_type
    }

    /// The raw FFS file attributes byte.
    pub fn attributes(&self) -> u8 {
        self.attributes
    }

    /// The raw FFS file state byte.
    pub fn state(&self) -> u8 {
        self.state
    }

    /// Total size of the file including its header.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Length of the file header (24, or 32 for large files).
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    /// File data following the header.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Top-level sections of the file. Empty for raw and pad files.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Error that stopped the section walk, when the file was kept anyway.
    pub fn error(&self) -> Option<&SectionError> {
        self.error.as_ref()
    }

    /// Whether the file type carries a section stream.
    pub fn has_sections(&self) -> bool {
        carries_sections(self.file_type)
    }

    /// Text of the first User Interface section found in the file, searching nested sections too.
    pub fn ui_name(&self) -> Option<String> {
        self.sections
            .iter()
            .flat_map(|section| section.descendants())
            .find(|section| matches!(section.kind(), SectionKind::UserInterface { .. }))
            .and_then(|section| section.text())
    }
}

impl FirmwareObject for File {
    fn name(&self) -> String {
        pi::guid_to_string(&self.name)
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.content)
    }

    fn is_container(&self) -> bool {
        self.has_sections()
    }
}

fn carries_sections(file_type: u8) -> bool {
    !matches!(file_type, r#type::RAW | r#type::FFS_PAD)
}

fn checksum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, value| sum.wrapping_add(*value))
}

impl FfsDecoder<'_> {
    /// Decode a standalone FFS file starting at the beginning of `data`.
    ///
    /// A failure in the section stream is returned as an error unless the configuration asks for
    /// files to be annotated, in which case the file keeps the sections decoded before it.
    pub fn decode_file(&self, data: &[u8]) -> Result<File, SectionError> {
        let file = self.decode_file_at(data, 0, 0)?;
        match (&file.error, self.config().file_errors) {
            (Some(err), FileErrorPolicy::Abort | FileErrorPolicy::Skip) => Err(err.clone()),
            _ => Ok(file),
        }
    }

    /// Decode the file at the start of `data`, whose first byte is at offset `base` in the
    /// enclosing buffer.
    ///
    /// Header, state and checksum failures are returned as errors. A failure while walking the
    /// sections is recorded on the returned file so the caller can still step over it.
    pub(crate) fn decode_file_at(&self, data: &[u8], base: usize, depth: usize) -> Result<File, SectionError> {
        let mut reader = SectionReader::with_base(data, base);
        let invalid = |reason| SectionError::InvalidFileHeader { offset: base, reason };

        if data.len() < HEADER_SIZE {
            return Err(invalid("buffer smaller than a file header"));
        }
        let name = reader.read_guid().map_err(|_| invalid("truncated name"))?;
        let _header_checksum = reader.read_u8().map_err(|_| invalid("truncated checksum"))?;
        let file_checksum = reader.read_u8().map_err(|_| invalid("truncated checksum"))?;
        let file_type = reader.read_u8().map_err(|_| invalid("truncated type"))?;
        let file_attributes = reader.read_u8().map_err(|_| invalid("truncated attributes"))?;
        let size = reader.read_u24().map_err(|_| invalid("truncated size"))?;
        let file_state = reader.read_u8().map_err(|_| invalid("truncated state"))?;

        let (size, header_length) = if file_attributes & attributes::LARGE_FILE == 0 {
            (size as usize, HEADER_SIZE)
        } else {
            let extended_size = reader.read_u64().map_err(|_| invalid("buffer smaller than a large file header"))?;
            (usize::try_from(extended_size).unwrap_or(usize::MAX), HEADER2_SIZE)
        };

        if size < header_length || size > data.len() {
            return Err(SectionError::InvalidLength {
                offset: base,
                section_type: file_type,
                length: size,
                bound: data.len(),
            });
        }

        if self.config().verify_integrity {
            // Erase polarity is inferred from the reserved high bit of the state byte. Only
            // EFI_FILE_DATA_VALID files are accepted.
            let data_state = if file_state & 0x80 == 0 { file_state & 0xFC } else { !file_state & 0xFC };
            if data_state != state::DATA_VALID {
                return Err(SectionError::InvalidFileState { offset: base, state: file_state });
            }

            let header_sum = checksum8(&data[..header_length]).wrapping_sub(file_state).wrapping_sub(file_checksum);
            if header_sum != 0 {
                return Err(SectionError::FileChecksumMismatch { offset: base });
            }

            if file_attributes & attributes::CHECKSUM == 0 {
                if file_checksum != FILE_CHECKSUM_UNUSED {
                    return Err(invalid("unused file checksum is not 0xAA"));
                }
            } else if checksum8(&data[header_length..size]).wrapping_add(file_checksum) != 0 {
                return Err(SectionError::FileChecksumMismatch { offset: base });
            }
        }

        let content = &data[header_length..size];
        let (sections, error) = if carries_sections(file_type) {
            self.decode_sections_partial(&mut SectionReader::with_base(content, base + header_length), depth)
        } else {
            (Vec::new(), None)
        };

        debug!(
            "Decoded {} file {} at {:#x}, size {:#x}, {} sections{}.",
            pi::file_type_name(file_type),
            pi::guid_to_string(&name),
            base,
            size,
            sections.len(),
            if error.is_some() { " (incomplete)" } else { "" }
        );

        Ok(File {
            offset: base,
            name,
            file_type,
            attributes: file_attributes,
            state: file_state,
            size,
            header_length,
            content: content.to_vec(),
            sections,
            error,
        })
    }
}
