//! Firmware File System (FFS) Section Support
//!
//! A [`Section`] is a fully decoded section record: its common header, the raw payload bytes and a
//! typed [`SectionKind`]. Decoding is a single dispatch on the section type tag; container kinds
//! hold their decoded children.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
mod encapsulation;
mod ui;

use alloc::{
    borrow::Cow,
    format,
    string::{String, ToString},
    vec::Vec,
};

use r_efi::efi;

use crate::{
    err::SectionError,
    header::SectionHeader,
    pi::{self, section_type},
    reader::SectionReader,
    tree::FirmwareObject,
    volume::Volume,
    walker::FfsDecoder,
};

pub use ui::decode_wide_text;

/// Typed view of a section payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    /// `EFI_COMPRESSION_SECTION`.
    Compression {
        /// Declared size of the decompressed section stream.
        uncompressed_length: u32,
        /// `CompressionType` byte.
        compression_type: u8,
        /// Sections decoded from the expanded stream.
        sections: Vec<Section>,
        /// False when the algorithm was unsupported and the section was kept opaque.
        expanded: bool,
    },
    /// `EFI_GUID_DEFINED_SECTION`.
    GuidDefined {
        /// `SectionDefinitionGuid` naming the encoding.
        guid: efi::Guid,
        /// Offset of the encoded data from the start of the section.
        data_offset: u16,
        /// `Attributes` bits.
        attributes: u16,
        /// Sections decoded from the expanded stream.
        sections: Vec<Section>,
        /// False when the algorithm was unsupported and the section was kept opaque.
        expanded: bool,
    },
    /// `EFI_SECTION_DISPOSABLE`.
    Disposable {
        /// Nested sections.
        sections: Vec<Section>,
    },
    /// `EFI_SECTION_PE32`.
    Pe32,
    /// `EFI_SECTION_PIC`.
    Pic,
    /// `EFI_SECTION_TE`.
    Te,
    /// `EFI_SECTION_DXE_DEPEX`.
    DxeDepex,
    /// `EFI_SECTION_VERSION`.
    Version {
        /// `BuildNumber`.
        build_number: u16,
        /// Version string code units, trailing NULs retained.
        version: Vec<u16>,
    },
    /// `EFI_SECTION_USER_INTERFACE`.
    UserInterface {
        /// File name code units, trailing NULs retained.
        text: Vec<u16>,
    },
    /// `EFI_SECTION_COMPATIBILITY16`.
    Compatibility16,
    /// `EFI_SECTION_FIRMWARE_VOLUME_IMAGE`.
    FirmwareVolumeImage {
        /// The embedded volume.
        volume: Volume,
    },
    /// `EFI_SECTION_FREEFORM_SUBTYPE_GUID`.
    FreeformSubtypeGuid {
        /// `SubTypeGuid`.
        sub_type_guid: efi::Guid,
    },
    /// `EFI_SECTION_RAW`.
    Raw,
    /// `EFI_SECTION_PEI_DEPEX`.
    PeiDepex,
    /// `EFI_SECTION_MM_DEPEX`.
    MmDepex,
    /// Any type tag without a dedicated decoder. The payload is kept verbatim.
    Unknown,
}

impl SectionKind {
    /// Decode the payload of a section whose header has already been consumed.
    ///
    /// `payload` is bounded to exactly `header.payload_length()` bytes.
    pub(crate) fn decode(
        decoder: &FfsDecoder<'_>,
        header: &SectionHeader,
        payload: &mut SectionReader<'_>,
        depth: usize,
    ) -> Result<Self, SectionError> {
        let kind = match header.section_type {
            section_type::COMPRESSION => decoder.decode_compression(header, payload, depth)?,
            section_type::GUID_DEFINED => decoder.decode_guid_defined(header, payload, depth)?,
            section_type::DISPOSABLE => decoder.decode_disposable(header, payload, depth)?,
            section_type::FIRMWARE_VOLUME_IMAGE => decoder.decode_volume_image(header, payload, depth)?,
            section_type::USER_INTERFACE => ui::decode_user_interface(header, payload)?,
            section_type::VERSION => ui::decode_version(header, payload)?,
            section_type::FREEFORM_SUBTYPE_GUID => {
                let sub_type_guid = payload.read_guid().map_err(|err| header.truncated(err))?;
                SectionKind::FreeformSubtypeGuid { sub_type_guid }
            }
            section_type::PE32 => SectionKind::Pe32,
            section_type::PIC => SectionKind::Pic,
            section_type::TE => SectionKind::Te,
            section_type::DXE_DEPEX => SectionKind::DxeDepex,
            section_type::COMPATIBILITY16 => SectionKind::Compatibility16,
            section_type::RAW => SectionKind::Raw,
            section_type::PEI_DEPEX => SectionKind::PeiDepex,
            section_type::MM_DEPEX => SectionKind::MmDepex,
            _ => SectionKind::Unknown,
        };
        Ok(kind)
    }

    /// Whether sections of this kind are directory-like in the tree.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SectionKind::Compression { .. }
                | SectionKind::GuidDefined { .. }
                | SectionKind::Disposable { .. }
                | SectionKind::FirmwareVolumeImage { .. }
        )
    }
}

/// A decoded section record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    header: SectionHeader,
    payload: Vec<u8>,
    kind: SectionKind,
}

impl Section {
    pub(crate) fn new(header: SectionHeader, payload: Vec<u8>, kind: SectionKind) -> Self {
        Self { header, payload, kind }
    }

    /// The common header.
    pub fn header(&self) -> &SectionHeader {
        &self.header
    }

    /// Offset of the section in the buffer it was decoded from.
    pub fn offset(&self) -> usize {
        self.header.offset
    }

    /// Section type tag.
    pub fn section_type(&self) -> u8 {
        self.header.section_type
    }

    /// Declared length including the header.
    pub fn total_length(&self) -> usize {
        self.header.total_length
    }

    /// The typed payload.
    pub fn kind(&self) -> &SectionKind {
        &self.kind
    }

    /// Raw payload bytes following the common header, exactly as found in the image.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload bytes after any type-specific fixed fields.
    ///
    /// For encapsulation sections this is the still-encoded data; for a Version section, the
    /// version string bytes; for a freeform section, the bytes after the subtype GUID.
    pub fn content(&self) -> &[u8] {
        let skip = match &self.kind {
            SectionKind::Compression { .. } => pi::section_header::COMPRESSION_SIZE,
            SectionKind::GuidDefined { data_offset, .. } => (*data_offset as usize).saturating_sub(self.header.header_length),
            SectionKind::Version { .. } => 2,
            SectionKind::FreeformSubtypeGuid { .. } => 16,
            _ => 0,
        };
        self.payload.get(skip..).unwrap_or(&[])
    }

    /// Child sections of an encapsulation section. Empty for every other kind.
    pub fn sections(&self) -> &[Section] {
        match &self.kind {
            SectionKind::Compression { sections, .. }
            | SectionKind::GuidDefined { sections, .. }
            | SectionKind::Disposable { sections } => sections,
            _ => &[],
        }
    }

    /// The embedded volume of a firmware volume image section.
    pub fn volume(&self) -> Option<&Volume> {
        match &self.kind {
            SectionKind::FirmwareVolumeImage { volume } => Some(volume),
            _ => None,
        }
    }

    /// Code units of a User Interface section.
    pub fn ui_text(&self) -> Option<&[u16]> {
        match &self.kind {
            SectionKind::UserInterface { text } => Some(text),
            _ => None,
        }
    }

    /// Decoded text of a User Interface or Version section with trailing NULs removed.
    pub fn text(&self) -> Option<String> {
        match &self.kind {
            SectionKind::UserInterface { text } => Some(decode_wide_text(text)),
            SectionKind::Version { version, .. } => Some(decode_wide_text(version)),
            _ => None,
        }
    }

    /// This section followed by every nested section in depth-first order, including the sections of
    /// embedded volumes.
    pub fn descendants(&self) -> Vec<&Section> {
        let mut found = Vec::new();
        self.collect_descendants(&mut found);
        found
    }

    fn collect_descendants<'s>(&'s self, found: &mut Vec<&'s Section>) {
        found.push(self);
        for child in self.sections() {
            child.collect_descendants(found);
        }
        if let Some(volume) = self.volume() {
            for file in volume.files() {
                for section in file.sections() {
                    section.collect_descendants(found);
                }
            }
        }
    }
}

impl FirmwareObject for Section {
    fn name(&self) -> String {
        let type_name = pi::section_type_name(self.header.section_type);
        match &self.kind {
            SectionKind::UserInterface { text } => {
                let name = decode_wide_text(text);
                if name.is_empty() {
                    format!("{} Section", type_name)
                } else {
                    name
                }
            }
            SectionKind::GuidDefined { guid, .. } => format!("{} Section {}", type_name, pi::guid_to_string(guid)),
            SectionKind::FreeformSubtypeGuid { sub_type_guid } => {
                format!("{} Section {}", type_name, pi::guid_to_string(sub_type_guid))
            }
            SectionKind::Unknown => format!("{} Section {:#04x}", type_name, self.header.section_type),
            _ => format!("{} Section", type_name),
        }
    }

    /// Text sections yield their full UTF-8 text, trailing NULs included.
    fn data(&self) -> Cow<'_, [u8]> {
        match &self.kind {
            SectionKind::UserInterface { text } => Cow::Owned(String::from_utf16_lossy(text).into_bytes()),
            SectionKind::Version { version, .. } => Cow::Owned(String::from_utf16_lossy(version).into_bytes()),
            _ => Cow::Borrowed(self.content()),
        }
    }

    fn is_container(&self) -> bool {
        self.kind.is_container()
    }
}

/// Leaf node recording why a file or volume could not be fully decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError<'e>(pub &'e SectionError);

impl FirmwareObject for ParseError<'_> {
    fn name(&self) -> String {
        String::from("Parse Error")
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.0.to_string().into_bytes())
    }

    fn is_container(&self) -> bool {
        false
    }
}
