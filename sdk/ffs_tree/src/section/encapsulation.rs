//! Encapsulation section decoders.
//!
//! Compression, GUID-defined and disposable sections wrap a nested section stream; firmware volume
//! image sections wrap a complete volume. Each of these enters one more level of nesting, which is
//! checked against the configured cap before any nested data is decoded.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use log::{trace, warn};

use super::{Section, SectionKind};
use crate::{
    config::UnsupportedAlgorithmPolicy,
    err::{AlgorithmId, SectionError},
    header::SectionHeader,
    pi::{compression_type, guid_defined_attributes, section_header::GUID_DEFINED_SIZE},
    reader::SectionReader,
    transform::{Algorithm, TransformError},
    walker::FfsDecoder,
};

impl FfsDecoder<'_> {
    /// Resolve a transform failure that the section cannot recover from on its own.
    ///
    /// Returns `Ok(())` when the section should be kept as an unexpanded container.
    fn transform_failure(
        &self,
        header: &SectionHeader,
        algorithm: &Algorithm<'_>,
        err: TransformError,
    ) -> Result<(), SectionError> {
        let algorithm = AlgorithmId::from(algorithm);
        match err {
            TransformError::Corrupt => Err(SectionError::TransformFailed { offset: header.offset, algorithm }),
            TransformError::Unsupported => match self.config().unsupported_algorithm {
                UnsupportedAlgorithmPolicy::Fail => {
                    Err(SectionError::UnsupportedAlgorithm { offset: header.offset, algorithm })
                }
                UnsupportedAlgorithmPolicy::Opaque => {
                    warn!("Keeping section at {:#x} unexpanded: unsupported {}.", header.offset, algorithm);
                    Ok(())
                }
            },
        }
    }

    /// Walk a transformed buffer. Offsets inside it are relative to its own start.
    fn decode_transformed(&self, decoded: &[u8], depth: usize) -> Result<Vec<Section>, SectionError> {
        self.decode_sections(&mut SectionReader::new(decoded), depth)
    }

    pub(crate) fn decode_compression(
        &self,
        header: &SectionHeader,
        payload: &mut SectionReader<'_>,
        depth: usize,
    ) -> Result<SectionKind, SectionError> {
        let uncompressed_length = payload.read_u32().map_err(|err| header.truncated(err))?;
        let compression_type = payload.read_u8().map_err(|err| header.truncated(err))?;
        let depth = self.enter_container(header, depth)?;

        let mut data = payload.sub_reader(payload.remaining()).map_err(|err| header.truncated(err))?;

        if compression_type == compression_type::NOT_COMPRESSED {
            let sections = self.decode_sections(&mut data, depth)?;
            return Ok(SectionKind::Compression { uncompressed_length, compression_type, sections, expanded: true });
        }

        let algorithm = Algorithm::Compression(compression_type);
        let (sections, expanded) = match self.transform().transform(&algorithm, data.data()) {
            Ok(decoded) => {
                if decoded.len() != uncompressed_length as usize {
                    warn!(
                        "Compression section at {:#x} declares {:#x} uncompressed bytes but expanded to {:#x}.",
                        header.offset,
                        uncompressed_length,
                        decoded.len()
                    );
                }
                trace!("Expanded compression section at {:#x} to {:#x} bytes.", header.offset, decoded.len());
                (self.decode_transformed(&decoded, depth)?, true)
            }
            Err(err) => {
                self.transform_failure(header, &algorithm, err)?;
                (Vec::new(), false)
            }
        };
        Ok(SectionKind::Compression { uncompressed_length, compression_type, sections, expanded })
    }

    pub(crate) fn decode_guid_defined(
        &self,
        header: &SectionHeader,
        payload: &mut SectionReader<'_>,
        depth: usize,
    ) -> Result<SectionKind, SectionError> {
        let guid = payload.read_guid().map_err(|err| header.truncated(err))?;
        let data_offset = payload.read_u16().map_err(|err| header.truncated(err))?;
        let attributes = payload.read_u16().map_err(|err| header.truncated(err))?;

        // data_offset is measured from the start of the section and may not point into the fixed header.
        let fixed_end = header.header_length + GUID_DEFINED_SIZE;
        if (data_offset as usize) < fixed_end || (data_offset as usize) > header.total_length {
            return Err(SectionError::InvalidLength {
                offset: header.offset,
                section_type: header.section_type,
                length: data_offset as usize,
                bound: header.total_length,
            });
        }
        let depth = self.enter_container(header, depth)?;

        let guid_header = payload.read_bytes(data_offset as usize - fixed_end).map_err(|err| header.truncated(err))?;
        let mut data = payload.sub_reader(payload.remaining()).map_err(|err| header.truncated(err))?;

        let processing_required = attributes & guid_defined_attributes::PROCESSING_REQUIRED != 0;
        let algorithm = Algorithm::GuidDefined { guid, header: guid_header };
        let (sections, expanded) = match self.transform().transform(&algorithm, data.data()) {
            Ok(decoded) => {
                trace!("Expanded GUID-defined section at {:#x} to {:#x} bytes.", header.offset, decoded.len());
                (self.decode_transformed(&decoded, depth)?, true)
            }
            Err(TransformError::Unsupported) if !processing_required => (self.decode_sections(&mut data, depth)?, true),
            Err(TransformError::Corrupt) if !processing_required && !self.config().verify_integrity => {
                warn!(
                    "Ignoring failed verification of GUID-defined section at {:#x} ({}).",
                    header.offset,
                    AlgorithmId::from(&algorithm)
                );
                (self.decode_sections(&mut data, depth)?, true)
            }
            Err(err) => {
                self.transform_failure(header, &algorithm, err)?;
                (Vec::new(), false)
            }
        };
        Ok(SectionKind::GuidDefined { guid, data_offset, attributes, sections, expanded })
    }

    pub(crate) fn decode_disposable(
        &self,
        header: &SectionHeader,
        payload: &mut SectionReader<'_>,
        depth: usize,
    ) -> Result<SectionKind, SectionError> {
        let depth = self.enter_container(header, depth)?;
        let sections = self.decode_sections(payload, depth)?;
        Ok(SectionKind::Disposable { sections })
    }

    pub(crate) fn decode_volume_image(
        &self,
        header: &SectionHeader,
        payload: &mut SectionReader<'_>,
        depth: usize,
    ) -> Result<SectionKind, SectionError> {
        let depth = self.enter_container(header, depth)?;
        let base = payload.absolute_position();
        let data = payload.read_bytes(payload.remaining()).map_err(|err| header.truncated(err))?;
        let volume = self.decode_volume_at(data, base, depth)?;
        Ok(SectionKind::FirmwareVolumeImage { volume })
    }
}
