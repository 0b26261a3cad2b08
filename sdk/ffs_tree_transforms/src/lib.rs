//! # Section Transform Implementations
//!
//! This crate provides implementations of the `ffs_tree::transform::SectionTransform` trait for the
//! encapsulation algorithms found in production firmware images.
//!
//! ## Features
//!
//! Each feature enables one transform. The crate is configured in this manner to reduce
//! compilation times, by only compiling the necessary implementations.
//! - `brotli`: Enables [`BrotliTransform`] for Brotli GUID-defined sections.
//! - `crc32`: Enables [`Crc32Transform`] to validate CRC32 GUID-defined sections and return the
//!   verified payload.
//! - `lzma`: Enables [`LzmaTransform`] for GUID-defined LZMA compressed sections. Requires `std`.
//! - `uefi_decompress`: Enables [`UefiDecompressTransform`] for standard compression sections and
//!   TianoCompress GUID-defined sections.
//!
//! [`CompositeTransform`] tries every enabled transform in turn.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

#[cfg(feature = "brotli")]
mod brotli;
#[cfg(feature = "brotli")]
pub use brotli::BrotliTransform;

#[cfg(feature = "crc32")]
mod crc32;
#[cfg(feature = "crc32")]
pub use crc32::Crc32Transform;

#[cfg(feature = "lzma")]
mod lzma;
#[cfg(feature = "lzma")]
pub use lzma::LzmaTransform;

#[cfg(feature = "uefi_decompress")]
mod uefi_decompress;
#[cfg(feature = "uefi_decompress")]
pub use uefi_decompress::UefiDecompressTransform;

mod composite;
pub use composite::CompositeTransform;

/// Zero-filled output buffer for a size declared by the input stream.
///
/// The size is untrusted, so a buffer that cannot be allocated is reported as corrupt data.
#[cfg(any(feature = "brotli", feature = "uefi_decompress"))]
pub(crate) fn output_buffer(len: usize) -> Result<alloc::vec::Vec<u8>, ffs_tree::transform::TransformError> {
    let mut buffer = alloc::vec::Vec::new();
    buffer.try_reserve_exact(len).map_err(|err| {
        log::warn!("Cannot allocate {:#x} output bytes: {}", len, err);
        ffs_tree::transform::TransformError::Corrupt
    })?;
    buffer.resize(len, 0);
    Ok(buffer)
}
