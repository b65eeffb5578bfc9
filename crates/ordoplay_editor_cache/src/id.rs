// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identity types used to address cached records.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of an object in the source-of-truth hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Reserved parent of top-level entities in notifications; never cached
    pub const ROOT: EntityId = EntityId(0);

    /// Create an entity ID from a raw value
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Check if this is the reserved root id
    pub const fn is_root(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// Product asset identifier: source guid plus product sub id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId {
    /// Guid of the source asset
    pub guid: Uuid,
    /// Sub id of the product within the source
    pub sub_id: u32,
}

impl AssetId {
    /// Create a new asset ID
    pub fn new(guid: Uuid, sub_id: u32) -> Self {
        Self { guid, sub_id }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}:{:x}", self.guid, self.sub_id)
    }
}

/// Alternate identity that resolves to a cached record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondaryKey {
    /// Content or source UUID
    Uuid(Uuid),
    /// Numeric scan folder id
    ScanFolder(i64),
    /// Numeric file id (files and folders)
    File(i64),
    /// Numeric source asset id
    Source(i64),
    /// Product asset id
    Product(AssetId),
}

/// Key accepted by [`HierarchyCache::lookup`](crate::HierarchyCache::lookup)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Primary entity identity
    Entity(EntityId),
    /// Any secondary identity
    Secondary(SecondaryKey),
}

impl From<EntityId> for CacheKey {
    fn from(id: EntityId) -> Self {
        CacheKey::Entity(id)
    }
}

impl From<SecondaryKey> for CacheKey {
    fn from(key: SecondaryKey) -> Self {
        CacheKey::Secondary(key)
    }
}

impl From<Uuid> for CacheKey {
    fn from(uuid: Uuid) -> Self {
        CacheKey::Secondary(SecondaryKey::Uuid(uuid))
    }
}

impl From<AssetId> for CacheKey {
    fn from(asset_id: AssetId) -> Self {
        CacheKey::Secondary(SecondaryKey::Product(asset_id))
    }
}
