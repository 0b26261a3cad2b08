//! Byte-image builders shared by the unit tests.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use std::{error::Error, iter};

use r_efi::efi;
use serde::Deserialize;

use crate::{
    pi::{
        compression_type, file, guid,
        section_header::{self, ALIGNMENT},
        section_type,
        volume::{ERASE_POLARITY, HEADER_SIZE, SIGNATURE},
    },
    transform::{Algorithm, SectionTransform, TransformError},
};

pub const FILE_GUID: efi::Guid =
    efi::Guid::from_fields(0x1B45CC0A, 0x156A, 0x428A, 0xAF, 0x62, &[0x49, 0x86, 0x4D, 0xA0, 0xE6, 0xE6]);
pub const OTHER_FILE_GUID: efi::Guid =
    efi::Guid::from_fields(0x8D59D32B, 0xC655, 0x4AE9, 0x9B, 0x15, &[0xF2, 0x59, 0x04, 0x99, 0x2A, 0x43]);
pub const FV_NAME_GUID: efi::Guid =
    efi::Guid::from_fields(0xA881D567, 0x6CB0, 0x4EEE, 0x84, 0x35, &[0x2E, 0x72, 0xD3, 0x3E, 0x45, 0xB5]);

const FILE_STATE_DATA_VALID: u8 = 0xF8;
const BLOCK_SIZE: u32 = 8;

pub fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

fn pad4(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.resize(bytes.len().next_multiple_of(ALIGNMENT), 0);
    bytes
}

fn checksum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, value| sum.wrapping_add(*value))
}

/// Section with a standard 4-byte header and no trailing padding.
pub fn section_bytes(section_type: u8, payload: &[u8]) -> Vec<u8> {
    let length = section_header::SIZE + payload.len();
    assert!(length < section_header::EXTENDED_SIZE_SENTINEL as usize);
    let mut bytes = (length as u32).to_le_bytes()[..3].to_vec();
    bytes.push(section_type);
    bytes.extend_from_slice(payload);
    bytes
}

/// NUL-terminated User Interface section padded to the section alignment.
pub fn ui_section(text: &str) -> Vec<u8> {
    let payload: Vec<u8> = wide(text).into_iter().chain(iter::once(0)).flat_map(u16::to_le_bytes).collect();
    pad4(section_bytes(section_type::USER_INTERFACE, &payload))
}

pub fn compression_section(compression_type: u8, uncompressed_length: u32, data: &[u8]) -> Vec<u8> {
    let mut payload = uncompressed_length.to_le_bytes().to_vec();
    payload.push(compression_type);
    payload.extend_from_slice(data);
    section_bytes(section_type::COMPRESSION, &payload)
}

pub fn guid_defined_section(guid: efi::Guid, attributes: u16, guid_header: &[u8], data: &[u8]) -> Vec<u8> {
    let data_offset = (section_header::SIZE + section_header::GUID_DEFINED_SIZE + guid_header.len()) as u16;
    let mut payload = guid.as_bytes().to_vec();
    payload.extend(data_offset.to_le_bytes());
    payload.extend(attributes.to_le_bytes());
    payload.extend_from_slice(guid_header);
    payload.extend_from_slice(data);
    section_bytes(section_type::GUID_DEFINED, &payload)
}

/// FFS file in the `DATA_VALID` state (erase polarity 1) with valid checksums.
pub fn build_file(name: efi::Guid, file_type: u8, attributes: u8, body: &[u8]) -> Vec<u8> {
    let large = attributes & file::attributes::LARGE_FILE != 0;
    let header_length = if large { file::HEADER2_SIZE } else { file::HEADER_SIZE };
    let size = header_length + body.len();

    let mut bytes = name.as_bytes().to_vec();
    bytes.extend([0, 0, file_type, attributes]);
    if large {
        bytes.extend([0, 0, 0]);
    } else {
        bytes.extend_from_slice(&(size as u32).to_le_bytes()[..3]);
    }
    bytes.push(FILE_STATE_DATA_VALID);
    if large {
        bytes.extend((size as u64).to_le_bytes());
    }

    bytes[16] = 0u8.wrapping_sub(checksum8(&bytes).wrapping_sub(FILE_STATE_DATA_VALID));
    bytes[17] = if attributes & file::attributes::CHECKSUM != 0 {
        0u8.wrapping_sub(checksum8(body))
    } else {
        file::FILE_CHECKSUM_UNUSED
    };
    bytes.extend_from_slice(body);
    bytes
}

pub fn file_bytes(name: efi::Guid, file_type: u8, body: &[u8]) -> Vec<u8> {
    build_file(name, file_type, 0, body)
}

/// Recompute the 16-bit header checksum of a volume image in place.
pub fn fix_volume_checksum(bytes: &mut [u8]) {
    let header_length = u16::from_le_bytes([bytes[48], bytes[49]]) as usize;
    bytes[50..52].copy_from_slice(&[0, 0]);
    let sum = bytes[..header_length]
        .chunks_exact(2)
        .fold(0u16, |sum, value| sum.wrapping_add(u16::from_le_bytes([value[0], value[1]])));
    bytes[50..52].copy_from_slice(&0u16.wrapping_sub(sum).to_le_bytes());
}

/// FFS2 volume with a single block map run, erase polarity 1 and the given files placed at
/// 8-byte aligned offsets.
pub fn volume_bytes(files: &[Vec<u8>], fv_name: Option<efi::Guid>) -> Vec<u8> {
    let header_length = HEADER_SIZE + 16;
    let mut bytes = vec![0u8; header_length];
    if let Some(fv_name) = fv_name {
        bytes.extend_from_slice(fv_name.as_bytes());
        bytes.extend(20u32.to_le_bytes());
    }
    for file in files {
        bytes.resize(bytes.len().next_multiple_of(file::ALIGNMENT), 0xFF);
        bytes.extend_from_slice(file);
    }
    bytes.resize(bytes.len().next_multiple_of(file::ALIGNMENT), 0xFF);

    let fv_length = bytes.len();
    bytes[16..32].copy_from_slice(guid::EFI_FIRMWARE_FILE_SYSTEM2_GUID.as_bytes());
    bytes[32..40].copy_from_slice(&(fv_length as u64).to_le_bytes());
    bytes[40..44].copy_from_slice(&SIGNATURE.to_le_bytes());
    bytes[44..48].copy_from_slice(&ERASE_POLARITY.to_le_bytes());
    bytes[48..50].copy_from_slice(&(header_length as u16).to_le_bytes());
    let ext_header_offset = if fv_name.is_some() { header_length as u16 } else { 0 };
    bytes[52..54].copy_from_slice(&ext_header_offset.to_le_bytes());
    bytes[55] = 2;
    bytes[56..60].copy_from_slice(&(fv_length as u32 / BLOCK_SIZE).to_le_bytes());
    bytes[60..64].copy_from_slice(&BLOCK_SIZE.to_le_bytes());
    fix_volume_checksum(&mut bytes);
    bytes
}

pub fn hex_decode(text: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {:?}", text));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair: String = pair.iter().collect();
            u8::from_str_radix(&pair, 16).map_err(|err| format!("{}: {}", pair, err))
        })
        .collect()
}

fn parse_guid(text: &str) -> Result<efi::Guid, Box<dyn Error>> {
    let uuid = uuid::Uuid::parse_str(text).map_err(|err| format!("{}: {}", text, err))?;
    Ok(efi::Guid::from_bytes(&uuid.to_bytes_le()))
}

/// Transform understanding standard compression and [`ShiftTransform::GUID`]: the encoded form is
/// an `S` marker followed by every byte incremented by one.
pub struct ShiftTransform;

impl ShiftTransform {
    pub const GUID: efi::Guid =
        efi::Guid::from_fields(0x5D1A2C3B, 0x7E21, 0x4A4A, 0x80, 0x01, &[0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);

    pub fn encode(data: &[u8]) -> Vec<u8> {
        iter::once(b'S').chain(data.iter().map(|byte| byte.wrapping_add(1))).collect()
    }
}

impl SectionTransform for ShiftTransform {
    fn transform(&self, algorithm: &Algorithm<'_>, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        match algorithm {
            Algorithm::Compression(compression_type::STANDARD_COMPRESSION) => {}
            Algorithm::GuidDefined { guid, .. } if *guid == Self::GUID => {}
            _ => return Err(TransformError::Unsupported),
        }
        match input.split_first() {
            Some((b'S', rest)) => Ok(rest.iter().map(|byte| byte.wrapping_sub(1)).collect()),
            _ => Err(TransformError::Corrupt),
        }
    }
}

/// YAML description of a volume image.
#[derive(Debug, Deserialize, Clone)]
pub struct VolumeLayout {
    fv_name: Option<String>,
    files: Vec<FileLayout>,
}

#[derive(Debug, Deserialize, Clone)]
struct FileLayout {
    name: String,
    file_type: u8,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    sections: Vec<SectionLayout>,
}

#[derive(Debug, Deserialize, Clone)]
struct SectionLayout {
    section_type: u8,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    build_number: Option<u16>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    sections: Vec<SectionLayout>,
}

impl VolumeLayout {
    pub fn build(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        let fv_name = self.fv_name.as_deref().map(parse_guid).transpose()?;
        let files = self.files.iter().map(FileLayout::build).collect::<Result<Vec<_>, _>>()?;
        Ok(volume_bytes(&files, fv_name))
    }
}

impl FileLayout {
    fn build(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        let body = match &self.data {
            Some(data) => hex_decode(data)?,
            None => SectionLayout::build_stream(&self.sections)?,
        };
        Ok(file_bytes(parse_guid(&self.name)?, self.file_type, &body))
    }
}

impl SectionLayout {
    fn build_stream(sections: &[SectionLayout]) -> Result<Vec<u8>, Box<dyn Error>> {
        let mut stream = Vec::new();
        for section in sections {
            stream.extend(pad4(section.build()?));
        }
        Ok(stream)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        let text = || -> Vec<u8> {
            let text = self.text.as_deref().unwrap_or_default();
            wide(text).into_iter().chain(iter::once(0)).flat_map(u16::to_le_bytes).collect()
        };
        let bytes = match self.section_type {
            section_type::USER_INTERFACE => section_bytes(self.section_type, &text()),
            section_type::VERSION => {
                let mut payload = self.build_number.unwrap_or_default().to_le_bytes().to_vec();
                payload.extend(text());
                section_bytes(self.section_type, &payload)
            }
            section_type::COMPRESSION => {
                let inner = Self::build_stream(&self.sections)?;
                compression_section(compression_type::NOT_COMPRESSED, inner.len() as u32, &inner)
            }
            section_type::DISPOSABLE => section_bytes(self.section_type, &Self::build_stream(&self.sections)?),
            _ => section_bytes(self.section_type, &hex_decode(self.data.as_deref().unwrap_or_default())?),
        };
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_produce_valid_checksums() {
        let file = file_bytes(FILE_GUID, file::r#type::RAW, b"abc");
        assert_eq!(checksum8(&file[..file::HEADER_SIZE]).wrapping_sub(file[23]).wrapping_sub(file[17]), 0);
        let volume = volume_bytes(&[file], None);
        let sum = volume[..72].chunks_exact(2).fold(0u16, |sum, v| sum.wrapping_add(u16::from_le_bytes([v[0], v[1]])));
        assert_eq!(sum, 0);
        assert_eq!(hex_decode("de ad BE EF").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(hex_decode("abc").is_err());
    }
}
