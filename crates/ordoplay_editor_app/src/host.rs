// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor host - keeps the caches in step with the scene.
//!
//! The host owns two entity info services: one mirrors the scene hierarchy
//! and feeds the outline, the other holds asset browser entries and their
//! thumbnails. Scene edits are applied to `SceneData` first and then pushed
//! into the entity cache through the service, so every view hears about
//! them.

use crate::assets::{AssetError, AssetScanner, ScanSummary};
use crate::outline::OutlineView;
use crate::scene::{EntityData, SceneData, SceneError};
use ordoplay_editor_cache::{
    Address, CacheConfig, CacheRecord, EntityId, EntityInfoService, ThumbnailRefresher,
};
use std::path::Path;
use std::time::{Duration, Instant};

/// Scan folder id of the project asset directory
const PROJECT_SCAN_FOLDER: i64 = 1;

/// Editor host state
pub struct EditorHost {
    /// Source of truth for entities
    scene: SceneData,
    /// Cache mirroring the scene
    entities: EntityInfoService,
    /// Cache of asset browser entries
    assets: EntityInfoService,
    /// Asset folder walker
    scanner: AssetScanner,
    /// Thumbnail worker for asset entries
    refresher: ThumbnailRefresher,
    /// Outline of the scene
    outline: OutlineView,
}

impl EditorHost {
    /// Create a host for `scene` and fill the entity cache
    pub fn new(config: &CacheConfig, scene: SceneData) -> Self {
        let mut entities = EntityInfoService::with_config(config);
        let outline = OutlineView::new();
        entities.subscribe(Address::Any, outline.clone());

        let mut host = Self {
            scene,
            entities,
            assets: EntityInfoService::with_config(config),
            scanner: AssetScanner::new(PROJECT_SCAN_FOLDER),
            refresher: ThumbnailRefresher::new(config),
            outline,
        };
        host.push_scene();
        host
    }

    /// The scene
    pub fn scene(&self) -> &SceneData {
        &self.scene
    }

    /// Entity cache service
    pub fn entities(&self) -> &EntityInfoService {
        &self.entities
    }

    /// Asset cache service
    pub fn assets(&self) -> &EntityInfoService {
        &self.assets
    }

    /// Scene outline
    pub fn outline(&self) -> &OutlineView {
        &self.outline
    }

    /// Rebuild the entity cache from the scene
    pub fn push_scene(&mut self) {
        self.entities.reset(self.scene.records());
    }

    /// Save the scene to a file
    pub fn save_scene(&self, path: &Path) -> Result<(), SceneError> {
        self.scene.save(path)?;
        tracing::info!("Saved scene to {}", path.display());
        Ok(())
    }

    /// Create an entity, optionally under `parent`
    pub fn create_entity(&mut self, name: &str, parent: Option<EntityId>) -> EntityId {
        let data = EntityData::new(name);
        let id = match parent.filter(|p| self.scene.get(p).is_some()) {
            Some(parent) => self.scene.add_child(parent, data),
            None => self.scene.add_entity(data),
        };
        self.refresh(id);
        tracing::debug!("Created entity {} ({})", id, name);
        id
    }

    /// Delete an entity and its descendants; returns how many were removed
    pub fn delete_entity(&mut self, id: EntityId) -> usize {
        let removed = self.scene.remove(&id);
        for entity in &removed {
            self.entities.destroy(*entity);
        }
        removed.len()
    }

    /// Rename an entity
    pub fn rename(&mut self, id: EntityId, name: &str) -> bool {
        let Some(entity) = self.scene.get_mut(&id) else {
            return false;
        };
        entity.name = name.to_string();
        self.entities.set_name(id, name)
    }

    /// Lock or unlock an entity
    pub fn set_locked(&mut self, id: EntityId, locked: bool) -> bool {
        let Some(entity) = self.scene.get_mut(&id) else {
            return false;
        };
        entity.locked = locked;
        self.entities.set_locked(id, locked)
    }

    /// Activate or deactivate an entity; descendants inherit hidden state
    pub fn set_active(&mut self, id: EntityId, active: bool) -> bool {
        match self.scene.get_mut(&id) {
            Some(entity) if entity.active != active => entity.active = active,
            _ => return false,
        }
        for entity in self.subtree(id) {
            if entity != id {
                self.refresh(entity);
            }
        }
        // Hidden state of the entity itself lands before its visibility event
        if let Some(mut record) = self.record_with_selection(id) {
            record.flags.visible = !active;
            self.entities.register(id, record);
        }
        self.entities.set_visible(id, active)
    }

    /// Select or deselect an entity
    pub fn select(&mut self, id: EntityId, selected: bool) -> bool {
        self.entities.set_selected(id, selected)
    }

    /// Move `child` under `parent`, or to the top level with `None`
    pub fn reparent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        if !self.scene.reparent(child, parent) {
            return false;
        }
        let moved = self.entities.set_parent(child, parent);
        for entity in self.subtree(child) {
            self.refresh(entity);
        }
        moved
    }

    /// Move `child` to `index` among its siblings
    pub fn reorder(&mut self, child: EntityId, index: usize) -> Option<usize> {
        let to = self.scene.reorder(child, index)?;
        let parent = self.scene.get(&child)?.parent?;
        self.entities.set_child_index(parent, child, to)
    }

    /// Scan an asset directory into the asset cache
    pub fn scan_assets(&mut self, root: &Path) -> Result<ScanSummary, AssetError> {
        self.scanner.scan(root, &mut self.assets)
    }

    /// Regenerate stale asset thumbnails until none are left or `timeout`
    /// passes; returns the number applied
    pub fn refresh_thumbnails(&mut self, timeout: Duration) -> usize {
        let started = Instant::now();
        let mut applied = 0;
        loop {
            self.refresher.schedule(&mut self.assets);
            applied += self.refresher.pump(&mut self.assets);

            let stale = self.assets.cache().dirty().next().is_some();
            if !stale && self.refresher.is_idle() {
                break;
            }
            if started.elapsed() >= timeout {
                tracing::warn!(
                    "Thumbnail refresh timed out with {} in flight",
                    self.refresher.pending_count()
                );
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        applied
    }

    /// Re-register an entity from the scene, keeping its selection
    fn refresh(&mut self, id: EntityId) {
        if let Some(record) = self.record_with_selection(id) {
            self.entities.register(id, record);
        }
    }

    fn record_with_selection(&self, id: EntityId) -> Option<CacheRecord> {
        let mut record = self.scene.record(&id)?;
        record.flags.selected = self
            .entities
            .cache()
            .get(id)
            .is_some_and(CacheRecord::is_selected);
        Some(record)
    }

    fn subtree(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(entity) = stack.pop() {
            if let Some(data) = self.scene.get(&entity) {
                out.push(entity);
                stack.extend(data.children.iter().rev());
            }
        }
        out
    }
}
