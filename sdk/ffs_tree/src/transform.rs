//! Transform collaborator used to expand encapsulation sections.
//!
//! The decoding engine never decompresses anything itself. When a compression or GUID-defined
//! section needs its payload converted into a section stream, the engine hands the algorithm
//! identifier and the encoded bytes to a [`SectionTransform`]. Implementations for the standard
//! algorithms live in the `ffs_tree_transforms` crate.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use r_efi::efi;

/// Algorithm identifier read from an encapsulation section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm<'a> {
    /// `EFI_COMPRESSION_SECTION` with the given `CompressionType`. `NOT_COMPRESSED` is handled by the
    /// engine and never reaches a transform.
    Compression(u8),
    /// `EFI_GUID_DEFINED_SECTION`.
    GuidDefined {
        /// `SectionDefinitionGuid`.
        guid: efi::Guid,
        /// GUID-specific header bytes between the fixed header and `DataOffset`.
        header: &'a [u8],
    },
}

/// Failure reported by a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    /// The algorithm identifier is not handled by this transform.
    Unsupported,
    /// The algorithm is handled but the input is malformed or fails verification.
    Corrupt,
}

/// Converts the encoded payload of an encapsulation section into a raw section stream.
///
/// An implementation should return:
/// - `Ok(Vec<u8>)` with the decoded bytes, which the engine walks as zero or more sections.
/// - `Err(TransformError::Unsupported)` when `algorithm` is not one it handles. Composite
///   transforms use this to try the next implementation.
/// - `Err(TransformError::Corrupt)` for hard failures.
pub trait SectionTransform {
    /// Decode `input` according to `algorithm`.
    fn transform(&self, algorithm: &Algorithm<'_>, input: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// A transform that supports no algorithm.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransform;

impl SectionTransform for NullTransform {
    fn transform(&self, _algorithm: &Algorithm<'_>, _input: &[u8]) -> Result<Vec<u8>, TransformError> {
        Err(TransformError::Unsupported)
    }
}
