//! Registration of decoded objects into a [`SectionTree`].
//!
//! Objects are registered parent first, then their children in byte order. The files of an
//! embedded volume are registered directly beneath the firmware volume image section.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use crate::{
    file::File,
    section::{ParseError, Section},
    tree::SectionTree,
    volume::Volume,
};

pub(crate) fn register_section<T: SectionTree>(tree: &mut T, parent: T::Handle, section: &Section) -> T::Handle {
    let handle = tree.add_child(parent, section);
    for child in section.sections() {
        register_section(tree, handle, child);
    }
    if let Some(volume) = section.volume() {
        register_volume_contents(tree, handle, volume);
    }
    handle
}

pub(crate) fn register_file<T: SectionTree>(tree: &mut T, parent: T::Handle, file: &File) -> T::Handle {
    let handle = tree.add_child(parent, file);
    for section in file.sections() {
        register_section(tree, handle, section);
    }
    if let Some(err) = file.error() {
        tree.add_child(handle, &ParseError(err));
    }
    handle
}

pub(crate) fn register_volume<T: SectionTree>(tree: &mut T, parent: T::Handle, volume: &Volume) -> T::Handle {
    let handle = tree.add_child(parent, volume);
    register_volume_contents(tree, handle, volume);
    handle
}

fn register_volume_contents<T: SectionTree>(tree: &mut T, handle: T::Handle, volume: &Volume) {
    for file in volume.files() {
        register_file(tree, handle, file);
    }
    if let Some(err) = volume.error() {
        tree.add_child(handle, &ParseError(err));
    }
}
