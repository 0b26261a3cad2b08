//! Wide-string sections: User Interface and Version.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{string::String, vec::Vec};

use super::SectionKind;
use crate::{err::SectionError, header::SectionHeader, reader::SectionReader};

/// Render UCS-2 code units as a string, dropping trailing NULs. Unpaired surrogates are replaced.
pub fn decode_wide_text(units: &[u16]) -> String {
    let end = units.iter().rposition(|&unit| unit != 0).map_or(0, |last| last + 1);
    String::from_utf16_lossy(&units[..end])
}

fn read_wide_payload(header: &SectionHeader, payload: &mut SectionReader<'_>) -> Result<Vec<u16>, SectionError> {
    let length = payload.remaining();
    if length % 2 != 0 {
        return Err(SectionError::OddPayloadLength { offset: header.offset, section_type: header.section_type, length });
    }
    payload.read_wide_string(length / 2).map_err(|err| header.truncated(err))
}

/// `EFI_USER_INTERFACE_SECTION`: the whole payload is the file name.
pub(super) fn decode_user_interface(
    header: &SectionHeader,
    payload: &mut SectionReader<'_>,
) -> Result<SectionKind, SectionError> {
    let text = read_wide_payload(header, payload)?;
    Ok(SectionKind::UserInterface { text })
}

/// `EFI_VERSION_SECTION`: a build number followed by the version string.
pub(super) fn decode_version(header: &SectionHeader, payload: &mut SectionReader<'_>) -> Result<SectionKind, SectionError> {
    let build_number = payload.read_u16().map_err(|err| header.truncated(err))?;
    let version = read_wide_payload(header, payload)?;
    Ok(SectionKind::Version { build_number, version })
}
