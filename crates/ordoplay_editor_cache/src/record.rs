// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-entity cached state.

use crate::id::{EntityId, SecondaryKey};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Display flags of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFlags {
    /// Selected in the editor
    pub selected: bool,
    /// Visibility toggle set on the entity itself
    pub visible: bool,
    /// Hidden because the entity or an ancestor is not visible
    pub hidden: bool,
    /// Locked against editing
    pub locked: bool,
}

impl Default for EntityFlags {
    fn default() -> Self {
        Self {
            selected: false,
            visible: true,
            hidden: false,
            locked: false,
        }
    }
}

/// Template (prefab/slice) provenance of an entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Name of the template asset the entity was instantiated from
    pub asset_name: String,
    /// Entity belongs to a template instance
    pub is_template_entity: bool,
    /// Entity belongs to a template nested inside another template
    pub is_nested_entity: bool,
    /// Entity is the root of a template instance
    pub is_template_root: bool,
    /// Entity is the root of a nested template instance
    pub is_nested_root: bool,
    /// Entity has overridden properties
    pub has_entity_overrides: bool,
    /// Some descendant has overridden properties
    pub has_children_overrides: bool,
}

/// Generated thumbnail pixels (RGBA8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA pixel data
    pub pixels: Vec<u8>,
}

/// Cached state derived for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Parent entity (if any)
    pub parent: Option<EntityId>,
    /// Ordered child entities
    pub children: Vec<EntityId>,
    /// Display name
    pub name: String,
    /// Sort index within the parent
    pub sort_index: u64,
    /// Display flags
    pub flags: EntityFlags,
    /// Template provenance
    pub template: TemplateInfo,
    /// Secondary identities resolving to this record
    pub keys: Vec<SecondaryKey>,
    /// Source file backing the entry, used for thumbnails
    pub source_path: Option<PathBuf>,
    /// Last generated thumbnail
    #[serde(skip)]
    pub thumbnail: Option<Thumbnail>,
}

impl Default for CacheRecord {
    fn default() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            name: "Entity".to_string(),
            sort_index: 0,
            flags: EntityFlags::default(),
            template: TemplateInfo::default(),
            keys: Vec::new(),
            source_path: None,
            thumbnail: None,
        }
    }
}

impl CacheRecord {
    /// Create a record with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the parent
    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the children
    pub fn with_children(mut self, children: impl Into<Vec<EntityId>>) -> Self {
        self.children = children.into();
        self
    }

    /// Add a secondary key
    pub fn with_key(mut self, key: SecondaryKey) -> Self {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    /// Set the source file path
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Get the child at `index`
    pub fn child(&self, index: usize) -> Option<EntityId> {
        self.children.get(index).copied()
    }

    /// Get the number of children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Get the position of `child` among the children
    pub fn child_index(&self, child: EntityId) -> Option<usize> {
        self.children.iter().position(|c| *c == child)
    }

    /// Check if `child` is listed as a child
    pub fn has_child(&self, child: EntityId) -> bool {
        self.children.contains(&child)
    }

    /// Check if the entity is selected
    pub fn is_selected(&self) -> bool {
        self.flags.selected
    }

    /// Check the entity's own visibility toggle
    pub fn is_visible(&self) -> bool {
        self.flags.visible
    }

    /// Check if the entity is hidden in the viewport
    pub fn is_hidden(&self) -> bool {
        self.flags.hidden
    }

    /// Check if the entity is locked
    pub fn is_locked(&self) -> bool {
        self.flags.locked
    }

    /// Check if the entity belongs to a template instance
    pub fn is_template_entity(&self) -> bool {
        self.template.is_template_entity
    }

    /// Check if the entity belongs to a nested template
    pub fn is_nested_entity(&self) -> bool {
        self.template.is_nested_entity
    }

    /// Check if the entity is a template root
    pub fn is_template_root(&self) -> bool {
        self.template.is_template_root
    }

    /// Check if the entity is a nested template root
    pub fn is_nested_root(&self) -> bool {
        self.template.is_nested_root
    }

    /// Check if the entity has overridden properties
    pub fn has_entity_overrides(&self) -> bool {
        self.template.has_entity_overrides
    }

    /// Check if a descendant has overridden properties
    pub fn has_children_overrides(&self) -> bool {
        self.template.has_children_overrides
    }

    /// Check if the entity or any descendant has overrides
    pub fn has_any_overrides(&self) -> bool {
        self.template.has_entity_overrides || self.template.has_children_overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record() {
        let record = CacheRecord::default();
        assert_eq!(record.name, "Entity");
        assert!(record.parent.is_none());
        assert!(record.is_visible());
        assert!(!record.is_selected());
        assert!(!record.is_locked());
    }

    #[test]
    fn test_child_queries() {
        let record = CacheRecord::new("Root").with_children([EntityId(3), EntityId(7)]);
        assert_eq!(record.child_count(), 2);
        assert_eq!(record.child(1), Some(EntityId(7)));
        assert_eq!(record.child(2), None);
        assert_eq!(record.child_index(EntityId(3)), Some(0));
        assert_eq!(record.child_index(EntityId(9)), None);
    }

    #[test]
    fn test_override_flags() {
        let mut record = CacheRecord::new("Door");
        assert!(!record.has_any_overrides());

        record.template.has_children_overrides = true;
        assert!(record.has_any_overrides());
        assert!(!record.has_entity_overrides());
    }

    #[test]
    fn test_with_key_is_deduplicated() {
        let record = CacheRecord::new("a.png")
            .with_key(SecondaryKey::File(4))
            .with_key(SecondaryKey::File(4));
        assert_eq!(record.keys, vec![SecondaryKey::File(4)]);
    }
}
