//! Module for a composite of every enabled transform.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use ffs_tree::transform::{Algorithm, SectionTransform, TransformError};

#[cfg(feature = "brotli")]
use crate::BrotliTransform;
#[cfg(feature = "crc32")]
use crate::Crc32Transform;
#[cfg(feature = "lzma")]
use crate::LzmaTransform;
#[cfg(feature = "uefi_decompress")]
use crate::UefiDecompressTransform;

/// Provides a composite transform that combines all transforms based on enabled feature flags.
///
/// Transforms are tried in order; the first one that does not report
/// [`TransformError::Unsupported`] decides the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompositeTransform {
    #[cfg(feature = "uefi_decompress")]
    uefi_decompress: UefiDecompressTransform,
    #[cfg(feature = "brotli")]
    brotli: BrotliTransform,
    #[cfg(feature = "crc32")]
    crc32: Crc32Transform,
    #[cfg(feature = "lzma")]
    lzma: LzmaTransform,
}

impl CompositeTransform {
    fn transforms(&self) -> Vec<&dyn SectionTransform> {
        #[allow(unused_mut)]
        let mut transforms: Vec<&dyn SectionTransform> = Vec::new();
        #[cfg(feature = "uefi_decompress")]
        transforms.push(&self.uefi_decompress);
        #[cfg(feature = "brotli")]
        transforms.push(&self.brotli);
        #[cfg(feature = "crc32")]
        transforms.push(&self.crc32);
        #[cfg(feature = "lzma")]
        transforms.push(&self.lzma);
        transforms
    }
}

impl SectionTransform for CompositeTransform {
    fn transform(&self, algorithm: &Algorithm<'_>, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        for transform in self.transforms() {
            match transform.transform(algorithm, input) {
                Err(TransformError::Unsupported) => (),
                result => return result,
            }
        }
        log::debug!("No transform supports {:?}.", algorithm);
        Err(TransformError::Unsupported)
    }
}

#[cfg(test)]
#[cfg(all(feature = "crc32", feature = "uefi_decompress"))]
mod tests {
    use super::*;
    use alloc::{vec, vec::Vec};
    use ffs_tree::{
        pi::{compression_type, guid, guid_defined_attributes, section_type},
        reader::SectionReader,
        section::SectionKind,
        DecodeConfig, FfsDecoder, FirmwareTree, SectionError,
    };
    use r_efi::efi;

    const UNKNOWN_GUID: efi::Guid =
        efi::Guid::from_fields(0x01234567, 0x89AB, 0xCDEF, 0x01, 0x23, &[0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);

    fn crc32_section(content: &[u8]) -> Vec<u8> {
        let total = 4 + 20 + 4 + content.len();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(total as u32).to_le_bytes()[..3]);
        bytes.push(section_type::GUID_DEFINED);
        bytes.extend_from_slice(guid::CRC32_SECTION.as_bytes());
        bytes.extend_from_slice(&28u16.to_le_bytes());
        bytes.extend_from_slice(&guid_defined_attributes::AUTH_STATUS_VALID.to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(content).to_le_bytes());
        bytes.extend_from_slice(content);
        bytes
    }

    #[cfg(feature = "brotli")]
    fn brotli_section(content: &[u8]) -> Vec<u8> {
        let total = 4 + 20 + content.len();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(total as u32).to_le_bytes()[..3]);
        bytes.push(section_type::GUID_DEFINED);
        bytes.extend_from_slice(guid::BROTLI_SECTION.as_bytes());
        bytes.extend_from_slice(&24u16.to_le_bytes());
        bytes.extend_from_slice(&guid_defined_attributes::PROCESSING_REQUIRED.to_le_bytes());
        bytes.extend_from_slice(content);
        bytes
    }

    #[test]
    fn unknown_algorithms_are_unsupported() {
        let composite = CompositeTransform::default();
        let algorithm = Algorithm::GuidDefined { guid: UNKNOWN_GUID, header: &[] };
        assert_eq!(composite.transform(&algorithm, &[1, 2, 3]), Err(TransformError::Unsupported));
        assert_eq!(composite.transform(&Algorithm::Compression(0x7F), &[1, 2, 3]), Err(TransformError::Unsupported));
    }

    #[test]
    fn unsupported_transforms_fall_through_to_the_next() {
        let composite = CompositeTransform::default();
        let content = b"payload";
        let crc = crc32fast::hash(content).to_le_bytes();
        let algorithm = Algorithm::GuidDefined { guid: guid::CRC32_SECTION, header: &crc };
        assert_eq!(composite.transform(&algorithm, content), Ok(content.to_vec()));
    }

    #[test]
    fn a_failing_transform_stops_the_chain() {
        let composite = CompositeTransform::default();
        let algorithm = Algorithm::Compression(compression_type::STANDARD_COMPRESSION);
        assert_eq!(composite.transform(&algorithm, &[0x01, 0x02]), Err(TransformError::Corrupt));
    }

    #[test]
    fn crc32_sections_expand_through_the_decoder() {
        // "AB" as a User Interface section inside a CRC32 envelope.
        let ui = [0x08, 0x00, 0x00, section_type::USER_INTERFACE, b'A', 0x00, b'B', 0x00];
        let bytes = crc32_section(&ui);

        let composite = CompositeTransform::default();
        let decoder = FfsDecoder::new(&composite);
        let mut tree = FirmwareTree::new();
        let root = tree.root();
        decoder.walk_sections(&bytes, &mut tree, root).unwrap();

        let envelope = tree.child(root, "GUID Defined Section FC1BCDB0-7D31-49AA-936A-A4600D9DD083").unwrap();
        assert_eq!(tree.child_names(envelope), vec!["AB"]);
    }

    #[test]
    fn crc32_mismatch_is_reported_as_corrupt_data() {
        let ui = [0x08, 0x00, 0x00, section_type::USER_INTERFACE, b'A', 0x00, b'B', 0x00];
        let mut bytes = crc32_section(&ui);
        // corrupt the stored CRC
        bytes[24] ^= 0xFF;

        let composite = CompositeTransform::default();
        let decoder = FfsDecoder::new(&composite);
        let mut reader = SectionReader::new(&bytes);
        assert!(matches!(decoder.decode_sections(&mut reader, 0), Err(SectionError::TransformFailed { offset: 0, .. })));

        // Without integrity verification, a non-required envelope is walked as-is.
        let decoder = FfsDecoder::with_config(&composite, DecodeConfig::default().with_verify_integrity(false));
        let mut reader = SectionReader::new(&bytes);
        let sections = decoder.decode_sections(&mut reader, 0).unwrap();
        assert!(matches!(sections[0].kind(), SectionKind::GuidDefined { .. }));
        assert_eq!(sections[0].sections()[0].text().as_deref(), Some("AB"));
    }

    #[test]
    #[cfg(feature = "brotli")]
    fn brotli_section_with_an_unallocatable_size_fails_to_expand() {
        let mut content = Vec::new();
        content.extend_from_slice(&u64::MAX.to_le_bytes());
        content.extend_from_slice(&[0u8; 12]);
        let bytes = brotli_section(&content);

        let composite = CompositeTransform::default();
        let decoder = FfsDecoder::new(&composite);
        let mut reader = SectionReader::new(&bytes);
        assert!(matches!(decoder.decode_sections(&mut reader, 0), Err(SectionError::TransformFailed { offset: 0, .. })));
    }
}
