// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the fallible parts of the cache crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or saving the cache configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error on {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Parse error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    /// Config written by a newer editor
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },
}

/// Errors that can occur during thumbnail generation
#[derive(Debug, Clone, Error)]
pub enum ThumbnailError {
    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Image decoding error
    #[error("Failed to decode image: {0}")]
    Decode(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}
