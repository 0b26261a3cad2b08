//! Firmware Volume (FV) Support
//!
//! Decodes `EFI_FIRMWARE_VOLUME_HEADER` images and the FFS files they contain.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{borrow::Cow, string::String, vec::Vec};

use log::{debug, error, trace, warn};
use r_efi::efi;

use crate::{
    config::FileErrorPolicy,
    err::SectionError,
    file::File,
    pi::{
        self,
        file::{r#type, ALIGNMENT, HEADER_SIZE as FILE_HEADER_SIZE},
        guid,
        volume::{BLOCK_MAP_ENTRY_SIZE, ERASE_POLARITY, EXT_HEADER_SIZE, FFS_REVISION, HEADER_SIZE, SIGNATURE},
    },
    reader::{OutOfBounds, SectionReader},
    register,
    tree::{FirmwareObject, SectionTree},
    walker::FfsDecoder,
};

/// One `EFI_FV_BLOCK_MAP_ENTRY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMapEntry {
    /// Number of blocks in the run.
    pub num_blocks: u32,
    /// Size of each block in the run.
    pub length: u32,
}

/// A decoded firmware volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    offset: usize,
    file_system_guid: efi::Guid,
    fv_name: Option<efi::Guid>,
    length: u64,
    attributes: u32,
    header_length: u16,
    revision: u8,
    block_map: Vec<BlockMapEntry>,
    files: Vec<File>,
    error: Option<SectionError>,
}

impl Volume {
    /// Offset of the volume header in the buffer it was decoded from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// `FileSystemGuid` (FFS2 or FFS3).
    pub fn file_system_guid(&self) -> efi::Guid {
        self.file_system_guid
    }

    /// `FvName` from the extended header, if present.
    pub fn fv_name(&self) -> Option<efi::Guid> {
        self.fv_name
    }

    /// `FvLength`.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// `Attributes` (`EFI_FVB_ATTRIBUTES_2`).
    pub fn attributes(&self) -> u32 {
        self.attributes
    }

    /// `HeaderLength`, including the block map.
    pub fn header_length(&self) -> u16 {
        self.header_length
    }

    /// `Revision`.
    pub fn revision(&self) -> u8 {
        self.revision
    }

    /// Block map without its zero terminator.
    pub fn block_map(&self) -> &[BlockMapEntry] {
        &self.block_map
    }

    /// Value of an erased byte in this volume.
    pub fn erase_byte(&self) -> u8 {
        erase_byte(self.attributes)
    }

    /// Decoded files in volume order. Pad files are not included.
    pub fn files(&self) -> &[File] {
        &self.files
    }

    /// Error that ended the file list early, when the volume was kept anyway.
    pub fn error(&self) -> Option<&SectionError> {
        self.error.as_ref()
    }
}

impl FirmwareObject for Volume {
    fn name(&self) -> String {
        match &self.fv_name {
            Some(fv_name) => pi::guid_to_string(fv_name),
            None => String::from("Firmware Volume"),
        }
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&[])
    }

    fn is_container(&self) -> bool {
        true
    }
}

fn erase_byte(attributes: u32) -> u8 {
    if attributes & ERASE_POLARITY != 0 {
        0xFF
    } else {
        0x00
    }
}

impl FfsDecoder<'_> {
    /// Decode the firmware volume at the start of `data`.
    pub fn decode_volume(&self, data: &[u8]) -> Result<Volume, SectionError> {
        self.decode_volume_at(data, 0, 0)
    }

    /// Decode the firmware volume at the start of `data` and register it, its files and their
    /// sections under `parent`.
    ///
    /// Nothing is registered when the volume fails to decode.
    pub fn walk_volume<T: SectionTree>(&self, data: &[u8], tree: &mut T, parent: T::Handle) -> Result<T::Handle, SectionError> {
        let volume = self.decode_volume(data)?;
        Ok(register::register_volume(tree, parent, &volume))
    }

    /// Decode the volume at the start of `data`, whose first byte is at offset `base` in the enclosing
    /// buffer. The sections of its files are at nesting level `depth`.
    pub(crate) fn decode_volume_at(&self, data: &[u8], base: usize, depth: usize) -> Result<Volume, SectionError> {
        let invalid = |reason| SectionError::InvalidVolumeHeader { offset: base, reason };

        // Verify that buffer has enough storage for a volume header.
        if data.len() < HEADER_SIZE {
            return Err(invalid("buffer smaller than a volume header"));
        }

        let mut reader = SectionReader::with_base(data, base);
        let truncated = |_: OutOfBounds| invalid("buffer smaller than a volume header");
        reader.skip(16).map_err(truncated)?;
        let file_system_guid = reader.read_guid().map_err(truncated)?;
        let fv_length = reader.read_u64().map_err(truncated)?;
        let signature = reader.read_u32().map_err(truncated)?;
        let attributes = reader.read_u32().map_err(truncated)?;
        let header_length = reader.read_u16().map_err(truncated)?;
        let _checksum = reader.read_u16().map_err(truncated)?;
        let ext_header_offset = reader.read_u16().map_err(truncated)? as usize;
        let _reserved = reader.read_u8().map_err(truncated)?;
        let revision = reader.read_u8().map_err(truncated)?;

        if signature != SIGNATURE {
            return Err(invalid("missing _FVH signature"));
        }

        let header_len = header_length as usize;
        if header_len < HEADER_SIZE {
            return Err(invalid("header length smaller than the fixed header"));
        }
        if header_len > data.len() {
            return Err(invalid("header length exceeds the buffer"));
        }
        if header_len & 0x01 != 0 {
            return Err(invalid("header length is not a multiple of 2"));
        }

        if self.config().verify_integrity {
            let sum = data[..header_len]
                .chunks_exact(2)
                .fold(0u16, |sum, value| sum.wrapping_add(u16::from_le_bytes([value[0], value[1]])));
            if sum != 0 {
                return Err(invalid("header checksum mismatch"));
            }
        }

        if revision < FFS_REVISION {
            return Err(invalid("unsupported header revision"));
        }

        if file_system_guid != guid::EFI_FIRMWARE_FILE_SYSTEM2_GUID
            && file_system_guid != guid::EFI_FIRMWARE_FILE_SYSTEM3_GUID
        {
            return Err(SectionError::UnsupportedFileSystem { offset: base, guid: file_system_guid });
        }

        if fv_length < header_len as u64 {
            return Err(invalid("volume length smaller than its header"));
        }
        if fv_length > data.len() as u64 {
            return Err(invalid("volume length exceeds the buffer"));
        }
        let fv_len = fv_length as usize;

        if ext_header_offset > fv_len {
            return Err(invalid("extended header outside the volume"));
        }

        let ext_header = if ext_header_offset != 0 {
            if ext_header_offset + EXT_HEADER_SIZE > fv_len {
                return Err(invalid("extended header exceeds the volume"));
            }
            let mut ext = SectionReader::with_base(&data[ext_header_offset..fv_len], base + ext_header_offset);
            let fv_name = ext.read_guid().map_err(|_| invalid("extended header exceeds the volume"))?;
            let ext_header_size = ext.read_u32().map_err(|_| invalid("extended header exceeds the volume"))? as usize;
            if ext_header_size < EXT_HEADER_SIZE || ext_header_offset + ext_header_size > fv_len {
                return Err(invalid("extended header size is invalid"));
            }
            Some((fv_name, ext_header_size))
        } else {
            None
        };

        let block_map = decode_block_map(&data[HEADER_SIZE..header_len]).map_err(invalid)?;

        let content_offset = match ext_header {
            Some((_, ext_header_size)) => ext_header_offset + ext_header_size,
            None => header_len,
        };
        // Files are 8-byte aligned relative to the start of the volume.
        let content_offset = content_offset.next_multiple_of(ALIGNMENT);

        let mut volume = Volume {
            offset: base,
            file_system_guid,
            fv_name: ext_header.map(|(fv_name, _)| fv_name),
            length: fv_length,
            attributes,
            header_length,
            revision,
            block_map,
            files: Vec::new(),
            error: None,
        };

        self.decode_files(&mut volume, &data[..fv_len], content_offset, depth)?;

        debug!(
            "Decoded volume {} at {:#x}, length {:#x}, {} files.",
            volume.name(),
            base,
            fv_length,
            volume.files.len()
        );
        Ok(volume)
    }

    fn decode_files(&self, volume: &mut Volume, data: &[u8], content_offset: usize, depth: usize) -> Result<(), SectionError> {
        let erase_byte = volume.erase_byte();
        let mut offset = content_offset;

        while offset + FILE_HEADER_SIZE <= data.len() {
            if data[offset..offset + FILE_HEADER_SIZE].iter().all(|&byte| byte == erase_byte) {
                break;
            }

            let file_offset = volume.offset + offset;
            let file = match self.decode_file_at(&data[offset..], file_offset, depth) {
                Ok(file) => file,
                Err(err) => {
                    // Without a trustworthy size there is no next file to move on to.
                    if self.config().file_errors == FileErrorPolicy::Abort {
                        error!("Aborting volume at {:#x}: {}", volume.offset, err);
                        return Err(err);
                    }
                    warn!("Ending file list of volume at {:#x} early: {}", volume.offset, err);
                    volume.error = Some(err);
                    break;
                }
            };

            offset = (offset + file.size()).next_multiple_of(ALIGNMENT);

            if file.file_type() == r#type::FFS_PAD {
                trace!("Skipping pad file at {:#x}.", file_offset);
                continue;
            }

            match (file.error(), self.config().file_errors) {
                (Some(err), FileErrorPolicy::Abort) => {
                    error!("Aborting volume at {:#x}: {}", volume.offset, err);
                    return Err(err.clone());
                }
                (Some(err), FileErrorPolicy::Skip) => {
                    warn!("Skipping file {} at {:#x}: {}", pi::guid_to_string(&file.name()), file_offset, err);
                }
                _ => volume.files.push(file),
            }
        }
        Ok(())
    }
}

fn decode_block_map(bytes: &[u8]) -> Result<Vec<BlockMapEntry>, &'static str> {
    if bytes.len() % BLOCK_MAP_ENTRY_SIZE != 0 {
        return Err("block map is not a whole number of entries");
    }

    let mut reader = SectionReader::new(bytes);
    let mut block_map = Vec::with_capacity(bytes.len() / BLOCK_MAP_ENTRY_SIZE);
    while reader.remaining() >= BLOCK_MAP_ENTRY_SIZE {
        let num_blocks = reader.read_u32().map_err(|_| "truncated block map")?;
        let length = reader.read_u32().map_err(|_| "truncated block map")?;
        block_map.push(BlockMapEntry { num_blocks, length });
    }

    let terminator = BlockMapEntry { num_blocks: 0, length: 0 };
    if block_map.pop() != Some(terminator) {
        return Err("block map is not terminated");
    }
    if block_map.is_empty() {
        return Err("block map is empty");
    }
    if block_map.contains(&terminator) {
        return Err("block map has an empty entry");
    }
    Ok(block_map)
}
