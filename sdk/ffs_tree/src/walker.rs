//! Section sequence walker.
//!
//! [`FfsDecoder`] is the decoding context shared by the section, file and volume decoders: the
//! transform collaborator used to expand encapsulation sections and the [`DecodeConfig`].
//!
//! A section stream is walked front to back. Each section is decoded (including everything nested
//! inside it) before the next one is looked at; the cursor then moves to the next 4-byte boundary
//! relative to the start of the walked region. The walk ends once fewer bytes remain than a minimal
//! section header.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use log::trace;

use crate::{
    config::DecodeConfig,
    err::SectionError,
    header::SectionHeader,
    pi::section_header::{ALIGNMENT, SIZE},
    reader::SectionReader,
    register,
    section::{Section, SectionKind},
    transform::SectionTransform,
    tree::SectionTree,
};

/// Decoding context for sections, files and volumes.
#[derive(Clone, Copy)]
pub struct FfsDecoder<'t> {
    transform: &'t dyn SectionTransform,
    config: DecodeConfig,
}

impl core::fmt::Debug for FfsDecoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FfsDecoder").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<'t> FfsDecoder<'t> {
    /// Create a decoder with the default configuration.
    pub fn new(transform: &'t dyn SectionTransform) -> Self {
        Self::with_config(transform, DecodeConfig::default())
    }

    /// Create a decoder with an explicit configuration.
    pub fn with_config(transform: &'t dyn SectionTransform, config: DecodeConfig) -> Self {
        Self { transform, config }
    }

    /// Active configuration.
    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub(crate) fn transform(&self) -> &'t dyn SectionTransform {
        self.transform
    }

    /// Depth of the children of a container at `depth`, or an error when that exceeds the cap.
    pub(crate) fn enter_container(&self, header: &SectionHeader, depth: usize) -> Result<usize, SectionError> {
        let nested = depth + 1;
        if nested > self.config.max_depth {
            return Err(SectionError::RecursionLimitExceeded { offset: header.offset, max_depth: self.config.max_depth });
        }
        Ok(nested)
    }

    /// Decode one section at the reader's cursor, bounded by `bound` bytes.
    ///
    /// On success the cursor is positioned just past the declared length of the section (it is not
    /// aligned). `depth` is the nesting level of the section itself.
    pub fn decode_section(
        &self,
        reader: &mut SectionReader<'_>,
        bound: usize,
        depth: usize,
    ) -> Result<Section, SectionError> {
        let header = SectionHeader::decode(reader, bound)?;
        // header decoding guarantees the declared length is inside the reader.
        let mut payload = reader.sub_reader(header.payload_length()).map_err(|err| header.truncated(err))?;
        let bytes = payload.data();
        let kind = SectionKind::decode(self, &header, &mut payload, depth)?;
        trace!(
            "Decoded section type {:#04x} at {:#x}, length {:#x}, depth {}.",
            header.section_type,
            header.offset,
            header.total_length,
            depth
        );
        Ok(Section::new(header, bytes.to_vec(), kind))
    }

    /// Walk the section stream from the reader's cursor to its end, handing each decoded section to
    /// `visit`. Stops at the first error, after every earlier section has been visited.
    fn for_each_section<F>(&self, reader: &mut SectionReader<'_>, depth: usize, mut visit: F) -> Result<(), SectionError>
    where
        F: FnMut(Section),
    {
        while reader.remaining() >= SIZE {
            let section = self.decode_section(reader, reader.remaining(), depth)?;
            visit(section);
            reader.align_to(ALIGNMENT);
        }
        Ok(())
    }

    /// Decode every section in the stream.
    pub fn decode_sections(&self, reader: &mut SectionReader<'_>, depth: usize) -> Result<Vec<Section>, SectionError> {
        let mut sections = Vec::new();
        self.for_each_section(reader, depth, |section| sections.push(section))?;
        Ok(sections)
    }

    /// Decode every section in the stream, keeping the sections decoded before a failure.
    pub fn decode_sections_partial(&self, reader: &mut SectionReader<'_>, depth: usize) -> (Vec<Section>, Option<SectionError>) {
        let mut sections = Vec::new();
        let result = self.for_each_section(reader, depth, |section| sections.push(section));
        (sections, result.err())
    }

    /// Decode the section stream in `data` and register every section (with its nested children)
    /// under `parent`, one section at a time in byte order.
    ///
    /// Sections registered before a failure stay in the tree; the failing section is not registered.
    /// Returns the handles of the top-level sections.
    pub fn walk_sections<T: SectionTree>(
        &self,
        data: &[u8],
        tree: &mut T,
        parent: T::Handle,
    ) -> Result<Vec<T::Handle>, SectionError> {
        let mut handles = Vec::new();
        self.for_each_section(&mut SectionReader::new(data), 0, |section| {
            handles.push(register::register_section(tree, parent, &section));
        })?;
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pi::section_type,
        test_support::{section_bytes, ui_section},
        transform::NullTransform,
        tree::{FirmwareObject, FirmwareTree},
    };

    #[test]
    fn two_ui_sections_fill_a_sixteen_byte_buffer() {
        let bytes = [
            0x08, 0x00, 0x00, 0x15, b'A', 0x00, b'B', 0x00, // "AB"
            0x06, 0x00, 0x00, 0x15, b'C', 0x00, 0x00, 0x00, // "C" plus alignment padding
        ];
        let decoder = FfsDecoder::new(&NullTransform);
        let mut tree = FirmwareTree::new();
        let root = tree.root();
        let handles = decoder.walk_sections(&bytes, &mut tree, root).unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(tree.child_names(root), vec!["AB", "C"]);

        let mut reader = SectionReader::new(&bytes);
        let sections = decoder.decode_sections(&mut reader, 0).unwrap();
        assert_eq!(reader.position(), 16);
        assert_eq!(sections[1].offset(), 8);
        assert_eq!(sections[1].header().payload_length(), 2);
    }

    #[test]
    fn short_declared_ui_length_reads_one_code_unit() {
        let bytes = [0x06, 0x00, 0x00, 0x15, b'A', 0x00, b'B', 0x00];
        let decoder = FfsDecoder::new(&NullTransform);
        let mut reader = SectionReader::new(&bytes);
        let sections = decoder.decode_sections(&mut reader, 0).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text().as_deref(), Some("A"));
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn cursor_advances_by_aligned_total_length() {
        for payload_length in 0..9usize {
            let mut bytes = section_bytes(section_type::RAW, &vec![0x5A; payload_length]);
            let total = bytes.len();
            bytes.resize(32, 0xFF);
            let decoder = FfsDecoder::new(&NullTransform);
            let mut reader = SectionReader::new(&bytes);
            let section = decoder.decode_section(&mut reader, bytes.len(), 0).unwrap();
            assert_eq!(section.header().header_length + section.header().payload_length(), section.total_length());
            reader.align_to(ALIGNMENT);
            assert_eq!(reader.position(), total.next_multiple_of(4));
        }
    }

    #[test]
    fn short_streams_yield_nothing() {
        let decoder = FfsDecoder::new(&NullTransform);
        let streams: [&[u8]; 3] = [&[], &[0x15], &[0x04, 0x00, 0x00]];
        for bytes in streams {
            let sections = decoder.decode_sections(&mut SectionReader::new(bytes), 0).unwrap();
            assert!(sections.is_empty());
        }
        let mut tree = FirmwareTree::new();
        let root = tree.root();
        assert!(decoder.walk_sections(&[0xFF, 0xFF], &mut tree, root).unwrap().is_empty());
        assert!(tree.is_empty());
    }

    #[test]
    fn overrunning_length_is_an_error_not_a_read() {
        let bytes = [0x20, 0x00, 0x00, 0x19, 0x00, 0x00, 0x00, 0x00];
        let decoder = FfsDecoder::new(&NullTransform);
        let err = decoder.decode_sections(&mut SectionReader::new(&bytes), 0).unwrap_err();
        assert_eq!(err, SectionError::InvalidLength { offset: 0, section_type: 0x19, length: 0x20, bound: 8 });
    }

    #[test]
    fn odd_declared_length_in_stream() {
        let bytes = [0x05, 0x00, 0x00, 0x15, b'A', 0x00, 0x00, 0x00];
        let decoder = FfsDecoder::new(&NullTransform);
        let err = decoder.decode_sections(&mut SectionReader::new(&bytes), 0).unwrap_err();
        assert!(matches!(err, SectionError::OddPayloadLength { length: 1, .. }));
    }

    #[test]
    fn unknown_tags_do_not_stop_the_walk() {
        let mut bytes = section_bytes(0x42, &[1, 2, 3, 4]);
        bytes.extend(ui_section("After"));
        let decoder = FfsDecoder::new(&NullTransform);
        let sections = decoder.decode_sections(&mut SectionReader::new(&bytes), 0).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].kind(), &SectionKind::Unknown);
        assert_eq!(sections[1].name(), "After");
    }

    #[test]
    fn extended_headers_are_walked() {
        let mut bytes = vec![0xFF, 0xFF, 0xFF, section_type::RAW, 0x0C, 0x00, 0x00, 0x00];
        bytes.extend([1, 2, 3, 4]);
        bytes.extend(ui_section("Next"));
        let decoder = FfsDecoder::new(&NullTransform);
        let sections = decoder.decode_sections(&mut SectionReader::new(&bytes), 0).unwrap();
        assert_eq!(sections[0].header().header_length, 8);
        assert!(sections[0].header().is_extended());
        assert_eq!(sections[0].payload(), &[1, 2, 3, 4]);
        assert_eq!(sections[1].offset(), 12);
    }

    #[test]
    fn nesting_is_capped() {
        // disposable(disposable(disposable(raw)))
        let mut bytes = section_bytes(section_type::RAW, b"leaf");
        for _ in 0..3 {
            bytes = section_bytes(section_type::DISPOSABLE, &bytes);
        }

        let config = DecodeConfig::default().with_max_depth(3);
        let decoder = FfsDecoder::with_config(&NullTransform, config);
        let section = decoder.decode_section(&mut SectionReader::new(&bytes), bytes.len(), 0).unwrap();
        assert_eq!(section.descendants().len(), 4);

        let config = DecodeConfig::default().with_max_depth(2);
        let decoder = FfsDecoder::with_config(&NullTransform, config);
        let err = decoder.decode_section(&mut SectionReader::new(&bytes), bytes.len(), 0).unwrap_err();
        assert_eq!(err, SectionError::RecursionLimitExceeded { offset: 8, max_depth: 2 });
    }

    #[test]
    fn failed_sections_are_not_registered() {
        let mut bytes = ui_section("Good");
        bytes.extend([0x05, 0x00, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00]);
        bytes.extend(ui_section("Never"));
        let decoder = FfsDecoder::new(&NullTransform);
        let mut tree = FirmwareTree::new();
        let root = tree.root();
        let err = decoder.walk_sections(&bytes, &mut tree, root).unwrap_err();
        assert!(matches!(err, SectionError::OddPayloadLength { .. }));
        assert_eq!(tree.child_names(root), vec!["Good"]);

        let (sections, err) = decoder.decode_sections_partial(&mut SectionReader::new(&bytes), 0);
        assert_eq!(sections.len(), 1);
        assert!(err.is_some());
    }

    #[test]
    fn container_children_are_registered_beneath_it() {
        let mut inner = ui_section("Child");
        inner.extend(section_bytes(section_type::PE32, b"MZ"));
        let bytes = section_bytes(section_type::DISPOSABLE, &inner);
        let decoder = FfsDecoder::new(&NullTransform);
        let mut tree = FirmwareTree::new();
        let root = tree.root();
        let handles = decoder.walk_sections(&bytes, &mut tree, root).unwrap();
        let container = handles[0];
        assert!(tree.node(container).unwrap().is_container());
        assert_eq!(tree.child_names(container), vec!["Child", "PE32 Section"]);
        assert_eq!(tree.node(tree.lookup("/Disposable Section/PE32 Section").unwrap()).unwrap().data(), b"MZ");
    }
}
