//! Decoder Configuration
//!
//! Controls how strictly images are validated and what the decoders do when they meet data they
//! cannot fully expand.
//!
//! ## Configuration Example
//!
//! ```rust
//! use ffs_tree::config::{DecodeConfig, FileErrorPolicy, UnsupportedAlgorithmPolicy};
//!
//! let config = DecodeConfig::default()
//!     .with_max_depth(8)
//!     .with_unsupported_algorithm(UnsupportedAlgorithmPolicy::Opaque)
//!     .with_file_errors(FileErrorPolicy::Annotate);
//! assert_eq!(config.max_depth, 8);
//! ```
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

/// Default cap on nested container sections (encapsulations and embedded volumes).
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// What a container decoder does when the transform collaborator does not support its algorithm
/// and the payload cannot be used untransformed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedAlgorithmPolicy {
    /// Fail the section with `SectionError::UnsupportedAlgorithm`.
    #[default]
    Fail,
    /// Keep the section as an unexpanded container holding its encoded payload.
    Opaque,
}

/// What the volume decoder does when one of its files fails to decode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorPolicy {
    /// Propagate the error and abort the volume.
    #[default]
    Abort,
    /// Log the error and drop the failing file.
    Skip,
    /// Keep the sections decoded before the failure and record the error on the file.
    Annotate,
}

/// Configuration shared by the section, file and volume decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Maximum container nesting depth. Top-level sections of a file are at depth zero.
    pub max_depth: usize,
    /// Verify volume header checksums, file header/data checksums and file state.
    pub verify_integrity: bool,
    /// Behavior for containers whose algorithm is unsupported.
    pub unsupported_algorithm: UnsupportedAlgorithmPolicy,
    /// Behavior for files that fail to decode inside a volume.
    pub file_errors: FileErrorPolicy,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        DecodeConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            verify_integrity: true,
            unsupported_algorithm: UnsupportedAlgorithmPolicy::Fail,
            file_errors: FileErrorPolicy::Abort,
        }
    }
}

impl DecodeConfig {
    /// Set the maximum container nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enable or disable checksum and state verification.
    pub fn with_verify_integrity(mut self, verify_integrity: bool) -> Self {
        self.verify_integrity = verify_integrity;
        self
    }

    /// Set the policy for unsupported container algorithms.
    pub fn with_unsupported_algorithm(mut self, policy: UnsupportedAlgorithmPolicy) -> Self {
        self.unsupported_algorithm = policy;
        self
    }

    /// Set the policy for files that fail to decode.
    pub fn with_file_errors(mut self, policy: FileErrorPolicy) -> Self {
        self.file_errors = policy;
        self
    }
}
