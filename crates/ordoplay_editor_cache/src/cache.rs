// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cached hierarchy index.
//!
//! Records live in a slot arena addressed by a generational index. The
//! primary map and every secondary map store only that index, so freeing a
//! slot is enough to invalidate all lookups that pointed at it.
//!
//! The cache keeps parent/child links mutually consistent for every record
//! that is present. A record may name a parent that is not cached yet; the
//! link is parked and completed once the parent arrives.

use crate::id::{CacheKey, EntityId, SecondaryKey};
use crate::record::{CacheRecord, Thumbnail};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Generational index into the record arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotIndex {
    index: u32,
    generation: u32,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<(EntityId, CacheRecord)>,
}

/// Indexed store of derived per-entity state
#[derive(Debug, Default)]
pub struct HierarchyCache {
    /// Record arena
    slots: Vec<Slot>,
    /// Vacant slot indices
    free: Vec<u32>,
    /// Primary identity -> slot
    entities: HashMap<EntityId, SlotIndex>,
    /// Secondary identity -> slot
    secondary: HashMap<SecondaryKey, SlotIndex>,
    /// Children whose parent is not cached (parent -> children)
    awaiting_parent: HashMap<EntityId, Vec<EntityId>>,
    /// Scan folder id -> root path
    scan_folders: HashMap<i64, PathBuf>,
    /// Entities with stale thumbnails
    dirty: HashSet<EntityId>,
    /// Bumped on every map mutation
    revision: u64,
}

impl HierarchyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached records
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the cache holds no records
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Mutation counter; changes whenever the maps change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Check if an entity is cached
    pub fn contains(&self, entity: EntityId) -> bool {
        self.get(entity).is_some()
    }

    /// Get the record of an entity
    pub fn get(&self, entity: EntityId) -> Option<&CacheRecord> {
        let idx = *self.entities.get(&entity)?;
        self.entry(idx).map(|(_, record)| record)
    }

    /// Look up a record by primary or secondary key
    pub fn lookup(&self, key: impl Into<CacheKey>) -> Option<&CacheRecord> {
        match key.into() {
            CacheKey::Entity(entity) => self.get(entity),
            CacheKey::Secondary(key) => {
                let idx = *self.secondary.get(&key)?;
                self.entry(idx).map(|(_, record)| record)
            }
        }
    }

    /// Resolve a key to the entity owning it
    pub fn resolve(&self, key: impl Into<CacheKey>) -> Option<EntityId> {
        match key.into() {
            CacheKey::Entity(entity) => self.contains(entity).then_some(entity),
            CacheKey::Secondary(key) => {
                let idx = *self.secondary.get(&key)?;
                self.entry(idx).map(|(entity, _)| *entity)
            }
        }
    }

    /// Iterate over all cached records (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &CacheRecord)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref().map(|(id, record)| (*id, record)))
    }

    /// Entities without a cached parent, ordered by sort index then id
    pub fn roots(&self) -> Vec<EntityId> {
        let mut roots: Vec<(u64, EntityId)> = self
            .iter()
            .filter(|(_, record)| record.parent.map_or(true, |p| !self.contains(p)))
            .map(|(id, record)| (record.sort_index, id))
            .collect();
        roots.sort();
        roots.into_iter().map(|(_, id)| id).collect()
    }

    /// Insert or replace the record of `entity`.
    ///
    /// [`EntityId::ROOT`] is never cached.
    ///
    /// Secondary keys are reindexed; a key claimed by another record is
    /// taken from it. Parent/child links are reconciled in both directions:
    /// the entity is appended to its parent's children, listed children are
    /// re-parented to it, and children dropped from the list lose their
    /// parent.
    pub fn upsert(&mut self, entity: EntityId, mut record: CacheRecord) {
        if entity.is_root() {
            tracing::warn!("Ignoring record for the reserved root id");
            return;
        }
        dedup(&mut record.children);
        dedup(&mut record.keys);

        let new_parent = record.parent;
        let new_children = record.children.clone();
        let new_keys = record.keys.clone();
        let (idx, previous) = self.store(entity, record);

        if let Some(prev) = &previous {
            for key in prev.keys.iter().filter(|k| !new_keys.contains(k)) {
                if self.secondary.get(key) == Some(&idx) {
                    self.secondary.remove(key);
                }
            }
        }
        for key in new_keys {
            if let Some(owner) = self.secondary.insert(key, idx) {
                if owner != idx {
                    if let Some((_, other)) = self.entry_mut(owner) {
                        other.keys.retain(|k| *k != key);
                    }
                }
            }
        }

        let old_parent = previous.as_ref().and_then(|prev| prev.parent);
        if old_parent != new_parent {
            if let Some(parent) = old_parent {
                self.unlink_from_parent(parent, entity);
            }
        }
        if let Some(parent) = new_parent {
            self.link_to_parent(parent, entity);
        }

        match &previous {
            Some(prev) => {
                for child in prev.children.iter().filter(|c| !new_children.contains(c)) {
                    if let Some(r) = self.record_mut(*child) {
                        if r.parent == Some(entity) {
                            r.parent = None;
                        }
                    }
                }
            }
            None => {
                if let Some(waiting) = self.awaiting_parent.remove(&entity) {
                    if let Some(r) = self.record_mut(entity) {
                        for child in waiting {
                            if !r.children.contains(&child) {
                                r.children.push(child);
                            }
                        }
                    }
                }
            }
        }
        for child in new_children {
            self.adopt(entity, child);
        }

        self.revision += 1;
    }

    /// Remove the record of `entity`; absent entities are a no-op.
    ///
    /// Children keep pointing at the removed entity and are re-linked if it
    /// is cached again.
    pub fn remove(&mut self, entity: EntityId) -> Option<CacheRecord> {
        let idx = self.entities.remove(&entity)?;
        let slot = self.slots.get_mut(idx.index as usize)?;
        let (_, record) = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(idx.index);

        for key in &record.keys {
            if self.secondary.get(key) == Some(&idx) {
                self.secondary.remove(key);
            }
        }
        if let Some(parent) = record.parent {
            self.unlink_from_parent(parent, entity);
        }
        for child in &record.children {
            if self.get(*child).is_some_and(|r| r.parent == Some(entity)) {
                park(&mut self.awaiting_parent, entity, *child);
            }
        }
        self.dirty.remove(&entity);

        self.revision += 1;
        Some(record)
    }

    /// Empty every map
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.entities.clear();
        self.secondary.clear();
        self.awaiting_parent.clear();
        self.scan_folders.clear();
        self.dirty.clear();
        self.revision += 1;
    }

    /// Make `child` a child of `parent` at `index` (or last).
    ///
    /// Both entities must be cached. Returns the index the child landed at.
    pub fn attach_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
        index: Option<usize>,
    ) -> Option<usize> {
        if parent == child || !self.contains(parent) {
            return None;
        }
        let old_parent = self.get(child)?.parent;
        if let Some(old) = old_parent.filter(|old| *old != parent) {
            self.unlink_from_parent(old, child);
            self.renumber(old);
        }
        self.record_mut(child)?.parent = Some(parent);

        let children = &mut self.record_mut(parent)?.children;
        children.retain(|c| *c != child);
        let at = index.map_or(children.len(), |i| i.min(children.len()));
        children.insert(at, child);
        self.renumber(parent);

        self.revision += 1;
        Some(at)
    }

    /// Break the link between `parent` and `child`.
    ///
    /// Works for a parent that is not cached too: the parked link is cut.
    pub fn detach_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        let unlisted = self.unlist_child(parent, child);
        let points_at_parent = self.get(child).is_some_and(|r| r.parent == Some(parent));
        let unlinked = points_at_parent && self.set_parent_link(child, None);
        unlisted || unlinked
    }

    /// Drop `child` from the children of `parent`, or from the children
    /// parked for it. The child's own parent link is left as is.
    pub fn unlist_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        let listed = match self.get(parent) {
            Some(record) => record.has_child(child),
            None => self
                .awaiting_parent
                .get(&parent)
                .is_some_and(|waiting| waiting.contains(&child)),
        };
        if !listed {
            return false;
        }
        self.unlink_from_parent(parent, child);
        self.renumber(parent);
        self.revision += 1;
        true
    }

    /// Point `child` at `parent` without touching any children list.
    ///
    /// A parent that is not cached gets the child parked.
    pub fn set_parent_link(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        if parent == Some(child) {
            return false;
        }
        let Some(old) = self.get(child).map(|r| r.parent) else {
            return false;
        };
        if old == parent {
            return false;
        }
        if let Some(old) = old.filter(|p| !self.contains(*p)) {
            self.unlink_from_parent(old, child);
        }
        if let Some(record) = self.record_mut(child) {
            record.parent = parent;
        }
        if let Some(parent) = parent.filter(|p| !self.contains(*p)) {
            park(&mut self.awaiting_parent, parent, child);
        }
        self.revision += 1;
        true
    }

    /// Cut the links of the children parked for `parent`, making them
    /// top-level. Returns the released children.
    pub fn release_awaiting(&mut self, parent: EntityId) -> Vec<EntityId> {
        let Some(waiting) = self.awaiting_parent.remove(&parent) else {
            return Vec::new();
        };
        let mut released = Vec::new();
        for child in waiting {
            if let Some(record) = self.record_mut(child) {
                if record.parent == Some(parent) {
                    record.parent = None;
                    released.push(child);
                }
            }
        }
        if !released.is_empty() {
            self.revision += 1;
        }
        released
    }

    /// Move `child` to `index` within its parent's children.
    ///
    /// The index is clamped to the last position. Returns the new index.
    pub fn move_child(&mut self, parent: EntityId, child: EntityId, index: usize) -> Option<usize> {
        let record = self.record_mut(parent)?;
        let from = record.child_index(child)?;
        record.children.remove(from);
        let to = index.min(record.children.len());
        record.children.insert(to, child);
        self.renumber(parent);

        self.revision += 1;
        Some(to)
    }

    /// Set the selection flag; returns whether it changed
    pub fn set_selected(&mut self, entity: EntityId, selected: bool) -> bool {
        self.update(entity, |r| replace(&mut r.flags.selected, selected))
    }

    /// Set the lock flag; returns whether it changed
    pub fn set_locked(&mut self, entity: EntityId, locked: bool) -> bool {
        self.update(entity, |r| replace(&mut r.flags.locked, locked))
    }

    /// Set the visibility flag; returns whether it changed
    pub fn set_visible(&mut self, entity: EntityId, visible: bool) -> bool {
        self.update(entity, |r| replace(&mut r.flags.visible, visible))
    }

    /// Set the display name; returns whether it changed
    pub fn set_name(&mut self, entity: EntityId, name: &str) -> bool {
        self.update(entity, |r| {
            if r.name == name {
                return false;
            }
            r.name = name.to_string();
            true
        })
    }

    /// Store a generated thumbnail
    pub fn set_thumbnail(&mut self, entity: EntityId, thumbnail: Thumbnail) -> bool {
        self.update(entity, |r| {
            r.thumbnail = Some(thumbnail);
            true
        })
    }

    /// Mark an entity's thumbnail stale; returns `false` if it is not cached
    pub fn mark_dirty(&mut self, entity: EntityId) -> bool {
        if !self.contains(entity) {
            return false;
        }
        self.dirty.insert(entity);
        true
    }

    /// Forget the stale mark of an entity
    pub fn clear_dirty(&mut self, entity: EntityId) {
        self.dirty.remove(&entity);
    }

    /// Check if an entity is known to be stale
    pub fn is_dirty(&self, entity: EntityId) -> bool {
        self.dirty.contains(&entity)
    }

    /// Iterate over stale entities
    pub fn dirty(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.dirty.iter().copied()
    }

    /// Register the root path of a scan folder
    pub fn register_scan_folder(&mut self, id: i64, path: impl Into<PathBuf>) {
        self.scan_folders.insert(id, path.into());
        self.revision += 1;
    }

    /// Get the root path of a scan folder
    pub fn scan_folder(&self, id: i64) -> Option<&Path> {
        self.scan_folders.get(&id).map(PathBuf::as_path)
    }

    fn entry(&self, idx: SlotIndex) -> Option<&(EntityId, CacheRecord)> {
        self.slots
            .get(idx.index as usize)
            .filter(|slot| slot.generation == idx.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, idx: SlotIndex) -> Option<&mut (EntityId, CacheRecord)> {
        self.slots
            .get_mut(idx.index as usize)
            .filter(|slot| slot.generation == idx.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    fn record_mut(&mut self, entity: EntityId) -> Option<&mut CacheRecord> {
        let idx = *self.entities.get(&entity)?;
        self.entry_mut(idx).map(|(_, record)| record)
    }

    fn update(&mut self, entity: EntityId, f: impl FnOnce(&mut CacheRecord) -> bool) -> bool {
        let changed = self.record_mut(entity).is_some_and(f);
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Put a record in its slot, allocating one for new entities
    fn store(&mut self, entity: EntityId, record: CacheRecord) -> (SlotIndex, Option<CacheRecord>) {
        if let Some(idx) = self.entities.get(&entity).copied() {
            if let Some(slot) = self.entry_mut(idx) {
                let previous = std::mem::replace(&mut slot.1, record);
                return (idx, Some(previous));
            }
        }

        let idx = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some((entity, record));
                SlotIndex {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some((entity, record)),
                });
                SlotIndex {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.entities.insert(entity, idx);
        (idx, None)
    }

    /// List `child` under `parent`, or park it until the parent is cached
    fn link_to_parent(&mut self, parent: EntityId, child: EntityId) {
        if parent == child {
            return;
        }
        match self.record_mut(parent) {
            Some(record) => {
                if !record.children.contains(&child) {
                    record.children.push(child);
                }
            }
            None => park(&mut self.awaiting_parent, parent, child),
        }
    }

    fn unlink_from_parent(&mut self, parent: EntityId, child: EntityId) {
        match self.record_mut(parent) {
            Some(record) => record.children.retain(|c| *c != child),
            None => {
                if let Some(waiting) = self.awaiting_parent.get_mut(&parent) {
                    waiting.retain(|c| *c != child);
                    if waiting.is_empty() {
                        self.awaiting_parent.remove(&parent);
                    }
                }
            }
        }
    }

    /// Point a listed child at `parent`, detaching it from any other parent
    fn adopt(&mut self, parent: EntityId, child: EntityId) {
        if parent == child {
            return;
        }
        let Some(old_parent) = self.get(child).map(|r| r.parent) else {
            return;
        };
        if old_parent == Some(parent) {
            return;
        }
        if let Some(old) = old_parent {
            self.unlink_from_parent(old, child);
        }
        if let Some(record) = self.record_mut(child) {
            record.parent = Some(parent);
        }
    }

    /// Sync children's sort index with their position
    fn renumber(&mut self, parent: EntityId) {
        let Some(children) = self.get(parent).map(|r| r.children.clone()) else {
            return;
        };
        for (position, child) in children.into_iter().enumerate() {
            if let Some(record) = self.record_mut(child) {
                record.sort_index = position as u64;
            }
        }
    }
}

fn park(awaiting: &mut HashMap<EntityId, Vec<EntityId>>, parent: EntityId, child: EntityId) {
    let waiting = awaiting.entry(parent).or_default();
    if !waiting.contains(&child) {
        waiting.push(child);
    }
}

fn replace(slot: &mut bool, value: bool) -> bool {
    let changed = *slot != value;
    *slot = value;
    changed
}

fn dedup<T: PartialEq + Copy>(items: &mut Vec<T>) {
    let mut seen = Vec::with_capacity(items.len());
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(*item);
            true
        }
    });
}
