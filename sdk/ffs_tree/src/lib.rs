//! Decoding of UEFI Firmware Volumes, Firmware File System (FFS) files and their sections, as
//! described in the UEFI Platform Initialization Specification Volume 3.
//!
//! Decoded objects are plain owned data ([`volume::Volume`], [`file::File`], [`section::Section`]).
//! They can be registered into any [`tree::SectionTree`]; [`tree::FirmwareTree`] is an in-memory
//! implementation suitable for browsing an image as a filesystem.
//!
//! Expanding compressed or otherwise encoded sections is delegated to a
//! [`transform::SectionTransform`] supplied by the caller.
//!
//! ## Example
//!
//! ```rust
//! use ffs_tree::{FfsDecoder, FirmwareTree, NullTransform};
//!
//! // "AB" as a User Interface section.
//! let bytes = [0x08, 0x00, 0x00, 0x15, b'A', 0x00, b'B', 0x00];
//!
//! let decoder = FfsDecoder::new(&NullTransform);
//! let mut tree = FirmwareTree::new();
//! let root = tree.root();
//! decoder.walk_sections(&bytes, &mut tree, root).unwrap();
//! assert!(tree.lookup("/AB").is_some());
//! ```
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod err;
pub mod file;
pub mod header;
pub mod pi;
pub mod reader;
mod register;
pub mod section;
pub mod transform;
pub mod tree;
pub mod volume;
pub mod walker;

#[cfg(test)]
mod test_support;

pub use config::DecodeConfig;
pub use err::SectionError;
pub use section::{Section, SectionKind};
pub use transform::{NullTransform, SectionTransform};
pub use tree::{FirmwareObject, FirmwareTree, SectionTree};
pub use walker::FfsDecoder;
