// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cache configuration.
//!
//! Stored as RON next to the project settings. A missing file yields the
//! defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "entity_cache.ron";

/// Default thumbnail edge length in pixels
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 128;

/// Default cap on thumbnails queued to the worker at once
pub const DEFAULT_MAX_PENDING_THUMBNAILS: usize = 64;

/// Runtime settings of the entity info cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Format version
    pub version: u32,
    /// Thumbnail edge length in pixels
    pub thumbnail_size: u32,
    /// Maximum thumbnails queued to the worker at once
    pub max_pending_thumbnails: usize,
    /// Log every entity info event at debug level
    pub log_events: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            max_pending_thumbnails: DEFAULT_MAX_PENDING_THUMBNAILS,
            log_events: false,
        }
    }
}

impl CacheConfig {
    /// Load the config, falling back to defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cache config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::from_ron(&content)
    }

    /// Parse the config from a RON string
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = ron::from_str(content)?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        Ok(config)
    }

    /// Save the config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, pretty)?;

        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
