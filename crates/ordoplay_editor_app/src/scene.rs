// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene data: the source of truth for the entity hierarchy.
//!
//! The scene owns entity names, flags and parent/child order. Every edit
//! made here is mirrored into the entity info cache by the host.

use indexmap::IndexMap;
use ordoplay_editor_cache::{CacheRecord, EntityFlags, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Scene file errors
#[derive(Debug, Error)]
pub enum SceneError {
    /// IO error
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Entity data stored in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    /// Entity name
    pub name: String,
    /// Whether the entity is active (visible)
    pub active: bool,
    /// Whether the entity is locked against editing
    #[serde(default)]
    pub locked: bool,
    /// Template the entity was instantiated from
    #[serde(default)]
    pub template: Option<String>,
    /// Parent entity (if any)
    pub parent: Option<EntityId>,
    /// Child entities
    pub children: Vec<EntityId>,
}

impl Default for EntityData {
    fn default() -> Self {
        Self {
            name: "Entity".to_string(),
            active: true,
            locked: false,
            template: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

impl EntityData {
    /// Create a new entity with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Scene data containing all entities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneData {
    /// All entities in the scene
    pub entities: IndexMap<EntityId, EntityData>,
    /// Next entity ID to hand out
    next_id: u64,
}

impl SceneData {
    /// Create a new empty scene
    pub fn new() -> Self {
        Self {
            entities: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Create the scene a fresh editor starts with
    pub fn starter() -> Self {
        let mut scene = Self::new();
        let world = scene.add_entity(EntityData::new("World"));
        scene.add_child(world, EntityData::new("Cube"));
        scene.add_child(world, EntityData::new("Sphere"));
        scene.add_entity(EntityData::new("Directional Light"));
        scene
    }

    /// Load a scene from a RON file
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)?;
        let mut scene: SceneData = ron::from_str(&content)?;
        let highest = scene.entities.keys().map(EntityId::value).max().unwrap_or(0);
        scene.next_id = scene.next_id.max(highest + 1);
        Ok(scene)
    }

    /// Save the scene to a RON file
    pub fn save(&self, path: &Path) -> Result<(), SceneError> {
        let ron_str = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, ron_str)?;
        Ok(())
    }

    /// Add a root entity to the scene
    pub fn add_entity(&mut self, data: EntityData) -> EntityId {
        let id = EntityId::new(self.next_id.max(1));
        self.next_id = id.value() + 1;
        self.entities.insert(id, data);
        id
    }

    /// Add an entity as the last child of `parent`
    pub fn add_child(&mut self, parent: EntityId, data: EntityData) -> EntityId {
        let id = self.add_entity(EntityData {
            parent: Some(parent),
            ..data
        });
        if let Some(parent) = self.entities.get_mut(&parent) {
            parent.children.push(id);
        }
        id
    }

    /// Get an entity by ID
    pub fn get(&self, id: &EntityId) -> Option<&EntityData> {
        self.entities.get(id)
    }

    /// Get a mutable reference to an entity by ID
    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut EntityData> {
        self.entities.get_mut(id)
    }

    /// Remove an entity and its descendants; returns the removed ids,
    /// deepest first
    pub fn remove(&mut self, id: &EntityId) -> Vec<EntityId> {
        let mut removed = Vec::new();
        self.collect_subtree(*id, &mut removed);
        removed.reverse();

        if let Some(parent) = self.get(id).and_then(|e| e.parent) {
            if let Some(parent) = self.entities.get_mut(&parent) {
                parent.children.retain(|c| c != id);
            }
        }
        for entity in &removed {
            self.entities.shift_remove(entity);
        }
        removed
    }

    /// Move `child` under `parent` (or to the root with `None`)
    pub fn reparent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        if !self.entities.contains_key(&child) || parent == Some(child) {
            return false;
        }
        if let Some(parent) = parent {
            if !self.entities.contains_key(&parent) || self.is_descendant(parent, child) {
                return false;
            }
        }

        if let Some(old) = self.get(&child).and_then(|e| e.parent) {
            if let Some(old) = self.entities.get_mut(&old) {
                old.children.retain(|c| *c != child);
            }
        }
        if let Some(parent) = parent.and_then(|p| self.entities.get_mut(&p)) {
            parent.children.push(child);
        }
        if let Some(entity) = self.entities.get_mut(&child) {
            entity.parent = parent;
        }
        true
    }

    /// Move `child` to `index` among its siblings; returns the new index
    pub fn reorder(&mut self, child: EntityId, index: usize) -> Option<usize> {
        let parent = self.get(&child)?.parent?;
        let siblings = &mut self.entities.get_mut(&parent)?.children;
        let from = siblings.iter().position(|c| *c == child)?;
        siblings.remove(from);
        let to = index.min(siblings.len());
        siblings.insert(to, child);
        Some(to)
    }

    /// Get all root entities (no parent)
    pub fn root_entities(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, data)| data.parent.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Build the cache record of an entity
    pub fn record(&self, id: &EntityId) -> Option<CacheRecord> {
        let data = self.get(id)?;
        let root_index = self.root_entities().iter().position(|r| r == id);
        Some(self.build_record(*id, data, root_index))
    }

    /// Build cache records for every entity
    pub fn records(&self) -> Vec<(EntityId, CacheRecord)> {
        let root_positions: HashMap<EntityId, usize> = self
            .root_entities()
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id, index))
            .collect();
        self.entities
            .iter()
            .map(|(id, data)| {
                let root_index = root_positions.get(id).copied();
                (*id, self.build_record(*id, data, root_index))
            })
            .collect()
    }

    /// Check if the entity and all its ancestors are active
    pub fn is_active_in_hierarchy(&self, id: EntityId) -> bool {
        let mut current = Some(id);
        while let Some(entity) = current.and_then(|c| self.get(&c)) {
            if !entity.active {
                return false;
            }
            current = entity.parent;
        }
        true
    }

    fn build_record(&self, id: EntityId, data: &EntityData, root_index: Option<usize>) -> CacheRecord {
        let sort_index = match data.parent.and_then(|p| self.get(&p)) {
            Some(parent) => parent.children.iter().position(|c| *c == id).unwrap_or(0),
            None => root_index.unwrap_or(0),
        };

        let mut record = CacheRecord::new(&data.name);
        record.parent = data.parent;
        record.children = data.children.clone();
        record.sort_index = sort_index as u64;
        record.flags = EntityFlags {
            visible: data.active,
            hidden: !self.is_active_in_hierarchy(id),
            locked: data.locked,
            ..Default::default()
        };
        if let Some(template) = &data.template {
            record.template.asset_name = template.clone();
            record.template.is_template_entity = true;
            record.template.is_template_root = data
                .parent
                .and_then(|p| self.get(&p))
                .map_or(true, |p| p.template.as_ref() != Some(template));
        }
        record
    }

    fn is_descendant(&self, candidate: EntityId, ancestor: EntityId) -> bool {
        let mut current = self.get(&candidate).and_then(|e| e.parent);
        while let Some(entity) = current {
            if entity == ancestor {
                return true;
            }
            current = self.get(&entity).and_then(|e| e.parent);
        }
        false
    }

    fn collect_subtree(&self, id: EntityId, out: &mut Vec<EntityId>) {
        let Some(entity) = self.get(&id) else {
            return;
        };
        out.push(id);
        for child in &entity.children {
            self.collect_subtree(*child, out);
        }
    }
}
