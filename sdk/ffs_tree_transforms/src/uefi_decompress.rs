//! Module for UEFI decompression.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use ffs_tree::{
    pi::{compression_type, guid},
    transform::{Algorithm, SectionTransform, TransformError},
};
use mu_rust_helpers::uefi_decompress::{decompress_into_with_algo, DecompressionAlgorithm};

/// Compressed and decompressed sizes lead the stream.
const HEADER_SIZE: usize = 8;

/// Provides decompression for sections compressed with UEFI compression algorithm and TianoCompress GUIDed sections.
#[derive(Debug, Default, Clone, Copy)]
pub struct UefiDecompressTransform;

impl SectionTransform for UefiDecompressTransform {
    fn transform(&self, algorithm: &Algorithm<'_>, src: &[u8]) -> Result<Vec<u8>, TransformError> {
        let algo = match algorithm {
            Algorithm::GuidDefined { guid, .. } if *guid == guid::TIANO_DECOMPRESS_SECTION => {
                DecompressionAlgorithm::TianoDecompress
            }
            Algorithm::Compression(compression_type::STANDARD_COMPRESSION) => DecompressionAlgorithm::UefiDecompress,
            _ => return Err(TransformError::Unsupported),
        };

        //sanity check the src data
        if src.len() < HEADER_SIZE {
            return Err(TransformError::Corrupt);
        }

        let mut field = [0u8; 4];
        field.copy_from_slice(&src[0..4]);
        let compressed_size = u32::from_le_bytes(field) as usize;
        match compressed_size.checked_add(HEADER_SIZE) {
            Some(end) if end <= src.len() => (),
            _ => return Err(TransformError::Corrupt),
        }

        // allocate a buffer to hold the decompressed data
        field.copy_from_slice(&src[4..8]);
        let decompressed_size = u32::from_le_bytes(field) as usize;
        let mut decompressed_buffer = crate::output_buffer(decompressed_size)?;

        decompress_into_with_algo(src, &mut decompressed_buffer, algo).map_err(|_err| {
            log::warn!("UEFI decompression of {:#x} bytes failed.", compressed_size);
            TransformError::Corrupt
        })?;
        Ok(decompressed_buffer)
    }
}
