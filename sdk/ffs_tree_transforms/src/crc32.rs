//! Module for CRC32 GUID-defined sections.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use ffs_tree::{
    pi::guid,
    transform::{Algorithm, SectionTransform, TransformError},
};

/// Validates CRC32 GUID-defined sections and returns the verified payload unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Crc32Transform;

impl SectionTransform for Crc32Transform {
    fn transform(&self, algorithm: &Algorithm<'_>, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let crc_header = match algorithm {
            Algorithm::GuidDefined { guid, header } if *guid == guid::CRC32_SECTION => *header,
            _ => return Err(TransformError::Unsupported),
        };

        if crc_header.len() < 4 {
            return Err(TransformError::Corrupt);
        }
        let mut expected = [0u8; 4];
        expected.copy_from_slice(&crc_header[..4]);
        let expected = u32::from_le_bytes(expected);
        let actual = crc32fast::hash(input);
        if expected != actual {
            log::warn!("CRC32 mismatch: expected {:#010x}, computed {:#010x}.", expected, actual);
            return Err(TransformError::Corrupt);
        }
        Ok(input.to_vec())
    }
}
