//! Module for LZMA decompression.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;
use std::io::Cursor;

use ffs_tree::{
    pi::guid,
    transform::{Algorithm, SectionTransform, TransformError},
};

/// Properties byte and dictionary size precede the unpacked size in the LZMA header.
const UNPACKED_SIZE_OFFSET: usize = 5;
const LZMA_HEADER_SIZE: usize = 13;

pub const LZMA_UNKNOWN_UNPACKED_SIZE_MAGIC_VALUE: u64 = 0xFFFF_FFFF_FFFF_FFFF;

/// Provides decompression for LZMA GUID-defined sections.
#[derive(Debug, Default, Clone, Copy)]
pub struct LzmaTransform;

impl SectionTransform for LzmaTransform {
    fn transform(&self, algorithm: &Algorithm<'_>, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        match algorithm {
            Algorithm::GuidDefined { guid, .. } if *guid == guid::LZMA_SECTION => (),
            _ => return Err(TransformError::Unsupported),
        }

        if input.len() < LZMA_HEADER_SIZE {
            return Err(TransformError::Corrupt);
        }

        // Get unpacked size to pre-allocate vector, if available
        let mut unpacked_size = [0u8; 8];
        unpacked_size.copy_from_slice(&input[UNPACKED_SIZE_OFFSET..LZMA_HEADER_SIZE]);
        let unpacked_size = u64::from_le_bytes(unpacked_size);
        let mut decompressed = Vec::<u8>::new();
        if unpacked_size != LZMA_UNKNOWN_UNPACKED_SIZE_MAGIC_VALUE {
            let capacity = usize::try_from(unpacked_size).map_err(|_| TransformError::Corrupt)?;
            decompressed.try_reserve_exact(capacity).map_err(|err| {
                log::warn!("Cannot allocate {:#x} bytes for the LZMA unpacked size: {}", unpacked_size, err);
                TransformError::Corrupt
            })?;
        }

        lzma_rs::lzma_decompress(&mut Cursor::new(input), &mut decompressed).map_err(|err| {
            log::warn!("LZMA stream failed to decompress: {:?}", err);
            TransformError::Corrupt
        })?;

        Ok(decompressed)
    }
}
