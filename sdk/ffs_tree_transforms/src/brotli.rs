//! Module for Brotli decompression.
//!
//! A Brotli GUID-defined section carries two little-endian u64 values ahead of the compressed
//! stream: the decompressed size and the scratch buffer size used by the EDK2 decoder.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{boxed::Box, vec, vec::Vec};
use alloc_no_stdlib::{self, define_index_ops_mut, SliceWrapper, SliceWrapperMut};
use brotli_decompressor::{BrotliDecompressStream, BrotliResult, BrotliState, HuffmanCode};
use ffs_tree::{
    pi::guid,
    transform::{Algorithm, SectionTransform, TransformError},
};

const SIZE_PREFIX: usize = 16;

//Rebox and HeapAllocator exist to satisfy BrotliDecompress custom allocation requirements.
//They essentially wrap Box for heap allocations.
struct Rebox<T>(Box<[T]>);

impl<T> core::default::Default for Rebox<T> {
    fn default() -> Self {
        Rebox(Vec::new().into_boxed_slice())
    }
}
define_index_ops_mut!(T, Rebox<T>);

impl<T> alloc_no_stdlib::SliceWrapper<T> for Rebox<T> {
    fn slice(&self) -> &[T] {
        &self.0
    }
}

impl<T> alloc_no_stdlib::SliceWrapperMut<T> for Rebox<T> {
    fn slice_mut(&mut self) -> &mut [T] {
        &mut self.0
    }
}

struct HeapAllocator<T: Clone> {
    pub default_value: T,
}

impl<T: Clone> alloc_no_stdlib::Allocator<T> for HeapAllocator<T> {
    type AllocatedMemory = Rebox<T>;
    fn alloc_cell(self: &mut HeapAllocator<T>, len: usize) -> Rebox<T> {
        Rebox(vec![self.default_value.clone(); len].into_boxed_slice())
    }
    fn free_cell(self: &mut HeapAllocator<T>, _data: Rebox<T>) {}
}

/// Provides decompression for Brotli GUID-defined sections.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrotliTransform;

impl SectionTransform for BrotliTransform {
    fn transform(&self, algorithm: &Algorithm<'_>, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        match algorithm {
            Algorithm::GuidDefined { guid, .. } if *guid == guid::BROTLI_SECTION => (),
            _ => return Err(TransformError::Unsupported),
        }

        if input.len() < SIZE_PREFIX {
            return Err(TransformError::Corrupt);
        }
        let mut out_size = [0u8; 8];
        out_size.copy_from_slice(&input[0..8]);
        let out_size = usize::try_from(u64::from_le_bytes(out_size)).map_err(|_| TransformError::Corrupt)?;

        let mut brotli_state = BrotliState::new(
            HeapAllocator::<u8> { default_value: 0 },
            HeapAllocator::<u32> { default_value: 0 },
            HeapAllocator::<HuffmanCode> { default_value: Default::default() },
        );
        let in_data = &input[SIZE_PREFIX..];
        let mut out_data = crate::output_buffer(out_size)?;
        let mut out_data_size = 0;
        let result = BrotliDecompressStream(
            &mut in_data.len(),
            &mut 0,
            in_data,
            &mut out_data.len(),
            &mut 0,
            out_data.as_mut_slice(),
            &mut out_data_size,
            &mut brotli_state,
        );

        match result {
            BrotliResult::ResultSuccess => Ok(out_data),
            _ => {
                log::warn!("Brotli stream failed to decompress into {:#x} bytes.", out_size);
                Err(TransformError::Corrupt)
            }
        }
    }
}
