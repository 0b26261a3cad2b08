//! Platform Initialization (PI) constants used by the decoders.
//!
//! Based on the values defined in the UEFI Platform Initialization (PI) Specification V1.8A
//! Volume 3, Sections 3.2.1 (Firmware Volume), 3.2.3 (Firmware File) and 3.2.4/3.2.5 (Sections).
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::string::String;

use r_efi::efi;

/// Firmware File System section type tags.
/// Note: Typically called `EFI_SECTION_*` in EDK II code.
pub mod section_type {
    /// Compression encapsulation section
    pub const COMPRESSION: u8 = 0x01;
    /// GUID-defined encapsulation section
    pub const GUID_DEFINED: u8 = 0x02;
    /// Disposable encapsulation section
    pub const DISPOSABLE: u8 = 0x03;
    /// PE32 executable section
    pub const PE32: u8 = 0x10;
    /// Position-independent code section
    pub const PIC: u8 = 0x11;
    /// Terse executable section
    pub const TE: u8 = 0x12;
    /// DXE dependency expression section
    pub const DXE_DEPEX: u8 = 0x13;
    /// Version information section
    pub const VERSION: u8 = 0x14;
    /// User interface string section
    pub const USER_INTERFACE: u8 = 0x15;
    /// Compatibility16 section
    pub const COMPATIBILITY16: u8 = 0x16;
    /// Firmware volume image section
    pub const FIRMWARE_VOLUME_IMAGE: u8 = 0x17;
    /// Freeform GUID subtype section
    pub const FREEFORM_SUBTYPE_GUID: u8 = 0x18;
    /// Raw data section
    pub const RAW: u8 = 0x19;
    /// PEI dependency expression section
    pub const PEI_DEPEX: u8 = 0x1B;
    /// MM dependency expression section
    pub const MM_DEPEX: u8 = 0x1C;
}

/// Common section header layout.
pub mod section_header {
    /// Size of `EFI_COMMON_SECTION_HEADER`.
    pub const SIZE: usize = 4;
    /// Size of `EFI_COMMON_SECTION_HEADER2`.
    pub const EXTENDED_SIZE: usize = 8;
    /// Value of the 24-bit size field that selects the extended header.
    pub const EXTENDED_SIZE_SENTINEL: u32 = 0x00FF_FFFF;
    /// Sections start at 4-byte aligned offsets in their enclosing stream.
    pub const ALIGNMENT: usize = 4;
    /// Size of the fixed `EFI_COMPRESSION_SECTION` fields following the common header.
    pub const COMPRESSION_SIZE: usize = 5;
    /// Size of the fixed `EFI_GUID_DEFINED_SECTION` fields following the common header.
    pub const GUID_DEFINED_SIZE: usize = 20;
}

/// `EFI_COMPRESSION_SECTION.CompressionType` values.
pub mod compression_type {
    /// Payload is stored uncompressed.
    pub const NOT_COMPRESSED: u8 = 0x00;
    /// Payload uses the EFI (Tiano variant) standard compression.
    pub const STANDARD_COMPRESSION: u8 = 0x01;
}

/// `EFI_GUID_DEFINED_SECTION.Attributes` bits.
pub mod guid_defined_attributes {
    /// The payload must be processed by the GUID-specific handler before use.
    pub const PROCESSING_REQUIRED: u16 = 0x01;
    /// The section carries authentication status.
    pub const AUTH_STATUS_VALID: u16 = 0x02;
}

/// Firmware file layout and enumerations.
pub mod file {
    /// Size of `EFI_FFS_FILE_HEADER`.
    pub const HEADER_SIZE: usize = 24;
    /// Size of `EFI_FFS_FILE_HEADER2`.
    pub const HEADER2_SIZE: usize = 32;
    /// Files start at 8-byte aligned offsets relative to the volume start.
    pub const ALIGNMENT: usize = 8;
    /// `IntegrityCheck.File` value used when the data checksum attribute is clear.
    pub const FILE_CHECKSUM_UNUSED: u8 = 0xAA;

    /// File type definitions.
    pub mod r#type {
        /// Raw data file
        pub const RAW: u8 = 0x01;
        /// Freeform file
        pub const FREEFORM: u8 = 0x02;
        /// Security (SEC) core file
        pub const SECURITY_CORE: u8 = 0x03;
        /// PEI core file
        pub const PEI_CORE: u8 = 0x04;
        /// DXE core file
        pub const DXE_CORE: u8 = 0x05;
        /// Pre-EFI module (PEIM) file
        pub const PEIM: u8 = 0x06;
        /// DXE driver file
        pub const DRIVER: u8 = 0x07;
        /// Combined PEIM and driver file
        pub const COMBINED_PEIM_DRIVER: u8 = 0x08;
        /// Application file
        pub const APPLICATION: u8 = 0x09;
        /// Management Mode (MM) file
        pub const MM: u8 = 0x0A;
        /// Firmware volume image file
        pub const FIRMWARE_VOLUME_IMAGE: u8 = 0x0B;
        /// Combined MM and DXE file
        pub const COMBINED_MM_DXE: u8 = 0x0C;
        /// MM core file
        pub const MM_CORE: u8 = 0x0D;
        /// MM standalone module file
        pub const MM_STANDALONE: u8 = 0x0E;
        /// MM standalone core file
        pub const MM_CORE_STANDALONE: u8 = 0x0F;
        /// FFS pad file type
        pub const FFS_PAD: u8 = 0xF0;
    }

    /// File attribute bits.
    pub mod attributes {
        /// File uses `EFI_FFS_FILE_HEADER2` with a 64-bit size.
        pub const LARGE_FILE: u8 = 0x01;
        /// File data is covered by `IntegrityCheck.File`.
        pub const CHECKSUM: u8 = 0x40;
    }

    /// File state bits.
    pub mod state {
        /// File header is under construction
        pub const HEADER_CONSTRUCTION: u8 = 0x01;
        /// File header is valid
        pub const HEADER_VALID: u8 = 0x02;
        /// File data is valid
        pub const DATA_VALID: u8 = 0x04;
    }
}

/// Firmware volume layout.
pub mod volume {
    /// Size of `EFI_FIRMWARE_VOLUME_HEADER` up to (not including) the block map.
    pub const HEADER_SIZE: usize = 56;
    /// Size of `EFI_FIRMWARE_VOLUME_EXT_HEADER`.
    pub const EXT_HEADER_SIZE: usize = 20;
    /// Size of one `EFI_FV_BLOCK_MAP_ENTRY`.
    pub const BLOCK_MAP_ENTRY_SIZE: usize = 8;
    /// `_FVH` signature.
    pub const SIGNATURE: u32 = u32::from_le_bytes(*b"_FVH");
    /// Minimum supported header revision.
    pub const FFS_REVISION: u8 = 0x02;
    /// `EFI_FVB2_ERASE_POLARITY` attribute bit.
    pub const ERASE_POLARITY: u32 = 0x0000_0800;
}

/// Well-known GUIDs.
pub mod guid {
    use r_efi::efi;

    /// `EFI_FIRMWARE_FILE_SYSTEM2_GUID`
    pub const EFI_FIRMWARE_FILE_SYSTEM2_GUID: efi::Guid =
        efi::Guid::from_fields(0x8C8CE578, 0x8A3D, 0x4F1C, 0x99, 0x35, &[0x89, 0x61, 0x85, 0xC3, 0x2D, 0xD3]);
    /// `EFI_FIRMWARE_FILE_SYSTEM3_GUID`
    pub const EFI_FIRMWARE_FILE_SYSTEM3_GUID: efi::Guid =
        efi::Guid::from_fields(0x5473C07A, 0x3DCB, 0x4DCA, 0xBD, 0x6F, &[0x1E, 0x96, 0x89, 0xE7, 0x34, 0x9A]);
    /// GUID-defined section compressed with LZMA.
    pub const LZMA_SECTION: efi::Guid =
        efi::Guid::from_fields(0xEE4E5898, 0x3914, 0x4259, 0x9D, 0x6E, &[0xDC, 0x7B, 0xD7, 0x94, 0x03, 0xCF]);
    /// GUID-defined section compressed with LZMA after an x86 BCJ filter.
    pub const LZMA_F86_SECTION: efi::Guid =
        efi::Guid::from_fields(0xD42AE6BD, 0x1352, 0x4BFB, 0x90, 0x9A, &[0xCA, 0x72, 0xA6, 0xEA, 0xE8, 0x89]);
    /// GUID-defined section compressed with Brotli.
    pub const BROTLI_SECTION: efi::Guid =
        efi::Guid::from_fields(0x3D532050, 0x5CDA, 0x4FD0, 0x87, 0x9E, &[0x0F, 0x7F, 0x63, 0x0D, 0x5A, 0xFB]);
    /// GUID-defined section protected by a CRC32.
    pub const CRC32_SECTION: efi::Guid =
        efi::Guid::from_fields(0xFC1BCDB0, 0x7D31, 0x49AA, 0x93, 0x6A, &[0xA4, 0x60, 0x0D, 0x9D, 0xD0, 0x83]);
    /// GUID-defined section compressed with TianoCompress.
    pub const TIANO_DECOMPRESS_SECTION: efi::Guid =
        efi::Guid::from_fields(0xA31280AD, 0x481E, 0x41B6, 0x95, 0xE8, &[0x12, 0x7F, 0x4C, 0x98, 0x47, 0x79]);
}

/// Human-readable name of a section type tag.
pub fn section_type_name(section_type: u8) -> &'static str {
    match section_type {
        section_type::COMPRESSION => "Compression",
        section_type::GUID_DEFINED => "GUID Defined",
        section_type::DISPOSABLE => "Disposable",
        section_type::PE32 => "PE32",
        section_type::PIC => "PIC",
        section_type::TE => "TE",
        section_type::DXE_DEPEX => "DXE Dependency",
        section_type::VERSION => "Version",
        section_type::USER_INTERFACE => "User Interface",
        section_type::COMPATIBILITY16 => "Compatibility16",
        section_type::FIRMWARE_VOLUME_IMAGE => "Firmware Volume Image",
        section_type::FREEFORM_SUBTYPE_GUID => "Freeform Subtype GUID",
        section_type::RAW => "Raw",
        section_type::PEI_DEPEX => "PEI Dependency",
        section_type::MM_DEPEX => "MM Dependency",
        _ => "Unknown",
    }
}

/// Human-readable name of a firmware file type.
pub fn file_type_name(file_type: u8) -> &'static str {
    match file_type {
        file::r#type::RAW => "Raw",
        file::r#type::FREEFORM => "Freeform",
        file::r#type::SECURITY_CORE => "Security Core",
        file::r#type::PEI_CORE => "PEI Core",
        file::r#type::DXE_CORE => "DXE Core",
        file::r#type::PEIM => "PEIM",
        file::r#type::DRIVER => "Driver",
        file::r#type::COMBINED_PEIM_DRIVER => "Combined PEIM/Driver",
        file::r#type::APPLICATION => "Application",
        file::r#type::MM => "MM",
        file::r#type::FIRMWARE_VOLUME_IMAGE => "Firmware Volume Image",
        file::r#type::COMBINED_MM_DXE => "Combined MM/DXE",
        file::r#type::MM_CORE => "MM Core",
        file::r#type::MM_STANDALONE => "MM Standalone",
        file::r#type::MM_CORE_STANDALONE => "MM Core Standalone",
        file::r#type::FFS_PAD => "Pad",
        0xC0..=0xDF => "OEM",
        0xE0..=0xEF => "Debug",
        _ => "Unknown",
    }
}

/// Registry-format (`8C8CE578-8A3D-4F1C-9935-896185C32DD3`) rendering of a GUID.
pub fn guid_to_string(guid: &efi::Guid) -> String {
    let mut buffer = uuid::Uuid::encode_buffer();
    let text = uuid::Uuid::from_bytes_le(*guid.as_bytes()).hyphenated().encode_upper(&mut buffer);
    String::from(&*text)
}
