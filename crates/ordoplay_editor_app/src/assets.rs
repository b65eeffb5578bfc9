// SPDX-License-Identifier: MIT OR Apache-2.0
//! Asset scanner - mirrors an asset folder into an entity info cache.
//!
//! The scan folder becomes the root entry, directories become folder
//! entries and files become source entries. Every entry can be found by
//! its file id; sources are also reachable by source id, guid and product
//! id. Identities are kept per path so a rescan hands out the same ids.

use ordoplay_editor_cache::{AssetId, CacheRecord, EntityId, EntityInfoService, SecondaryKey};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

/// First entity id handed to asset entries, above any scene id
pub const ASSET_ID_BASE: u64 = 1 << 48;

/// Asset scan errors
#[derive(Debug, Error)]
pub enum AssetError {
    /// Scan root is missing or not a directory
    #[error("Not an asset directory: {0}")]
    NotADirectory(PathBuf),
}

/// Result of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Entry of the scan folder itself
    pub root: EntityId,
    /// Directories below the scan folder
    pub folders: usize,
    /// Files below the scan folder
    pub files: usize,
}

/// Identity assigned to one path
#[derive(Debug, Clone, Copy)]
struct AssetIdentity {
    entity: EntityId,
    guid: Uuid,
}

/// Walks asset folders and registers their entries
#[derive(Debug)]
pub struct AssetScanner {
    /// Id of the scan folder
    scan_folder: i64,
    /// Identity per scanned path
    identities: HashMap<PathBuf, AssetIdentity>,
    /// Next entity id to hand out
    next_id: u64,
}

impl AssetScanner {
    /// Create a scanner for the scan folder with the given id
    pub fn new(scan_folder: i64) -> Self {
        Self {
            scan_folder,
            identities: HashMap::new(),
            next_id: ASSET_ID_BASE,
        }
    }

    /// Entity registered for a path by a previous scan
    pub fn entity_for_path(&self, path: &Path) -> Option<EntityId> {
        self.identities.get(path).map(|identity| identity.entity)
    }

    /// Scan `root` and replace the contents of `service` with its entries.
    ///
    /// Files are marked stale so their thumbnails get generated.
    pub fn scan(
        &mut self,
        root: &Path,
        service: &mut EntityInfoService,
    ) -> Result<ScanSummary, AssetError> {
        if !root.is_dir() {
            return Err(AssetError::NotADirectory(root.to_path_buf()));
        }

        let mut records = Vec::new();
        let mut files = Vec::new();
        let mut folders = 0;
        let mut sort_counters: HashMap<EntityId, u64> = HashMap::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable asset entry: {}", e);
                    continue;
                }
            };
            let path = entry.path().to_path_buf();
            let identity = self.identity(&path);
            seen.insert(path.clone());
            let file_id = self.file_id(identity.entity);
            let name = entry.file_name().to_string_lossy().into_owned();

            let mut record = CacheRecord::new(name).with_key(SecondaryKey::File(file_id));
            if entry.depth() == 0 {
                record = record.with_key(SecondaryKey::ScanFolder(self.scan_folder));
            } else {
                let parent = entry
                    .path()
                    .parent()
                    .and_then(|p| self.entity_for_path(p));
                if let Some(parent) = parent {
                    let counter = sort_counters.entry(parent).or_default();
                    record.sort_index = *counter;
                    *counter += 1;
                    record = record.with_parent(parent);
                }

                if entry.file_type().is_dir() {
                    folders += 1;
                } else {
                    record = record
                        .with_key(SecondaryKey::Source(file_id))
                        .with_key(SecondaryKey::Uuid(identity.guid))
                        .with_key(SecondaryKey::Product(AssetId::new(identity.guid, 0)))
                        .with_source_path(path.clone());
                    files.push(identity.entity);
                }
            }
            records.push((identity.entity, record));
        }

        let root_entity = self.identity(root).entity;
        seen.insert(root.to_path_buf());
        self.identities.retain(|path, _| seen.contains(path));

        service.reset_with_scan_folders(records, [(self.scan_folder, root)]);
        for entity in &files {
            service.mark_dirty(*entity);
        }

        tracing::info!(
            "Scanned {}: {} folders, {} files",
            root.display(),
            folders,
            files.len()
        );
        Ok(ScanSummary {
            root: root_entity,
            folders,
            files: files.len(),
        })
    }

    fn identity(&mut self, path: &Path) -> AssetIdentity {
        if let Some(identity) = self.identities.get(path) {
            return *identity;
        }
        let identity = AssetIdentity {
            entity: EntityId::new(self.next_id),
            guid: Uuid::new_v4(),
        };
        self.next_id += 1;
        self.identities.insert(path.to_path_buf(), identity);
        identity
    }

    fn file_id(&self, entity: EntityId) -> i64 {
        (entity.value() - ASSET_ID_BASE) as i64
    }
}
