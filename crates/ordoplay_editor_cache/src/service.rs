// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity info service.
//!
//! The service is the single writer of the cache. Structural operations
//! fire a Begin event, mutate the cache, then fire the matching End event.
//! Property operations mutate first and fire one event afterwards, and only
//! when the value actually changed. Operations naming entities that are not
//! cached do nothing.
//!
//! Top-level entities are announced with [`EntityId::ROOT`] as their parent.

use crate::cache::HierarchyCache;
use crate::config::CacheConfig;
use crate::id::EntityId;
use crate::notify::{
    Address, ChangeNotifier, EntityInfoEvent, EntityInfoHandler, Phase, SubscriptionId,
    TracingHandler,
};
use crate::record::{CacheRecord, Thumbnail};
use std::path::PathBuf;

/// Owner of the entity info cache and its notifier
#[derive(Default)]
pub struct EntityInfoService {
    cache: HierarchyCache,
    notifier: ChangeNotifier,
}

impl EntityInfoService {
    /// Create an empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service configured from `config`
    pub fn with_config(config: &CacheConfig) -> Self {
        let mut service = Self::new();
        if config.log_events {
            service.subscribe(Address::Any, TracingHandler);
        }
        service
    }

    /// Read-only access to the cache
    pub fn cache(&self) -> &HierarchyCache {
        &self.cache
    }

    /// Register a handler at an address
    pub fn subscribe(
        &mut self,
        address: impl Into<Address>,
        handler: impl EntityInfoHandler + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(address, handler)
    }

    /// Remove a handler
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Replace every record inside a reset bracket
    pub fn reset(&mut self, records: impl IntoIterator<Item = (EntityId, CacheRecord)>) {
        self.reset_with_scan_folders(records, std::iter::empty::<(i64, PathBuf)>());
    }

    /// Replace every record and scan folder inside one reset bracket
    pub fn reset_with_scan_folders<P: Into<PathBuf>>(
        &mut self,
        records: impl IntoIterator<Item = (EntityId, CacheRecord)>,
        scan_folders: impl IntoIterator<Item = (i64, P)>,
    ) {
        let records: Vec<_> = records.into_iter().collect();
        let count = records.len();
        self.bracket(EntityInfoEvent::Reset { phase: Phase::Begin }, |cache| {
            cache.clear();
            for (id, path) in scan_folders {
                cache.register_scan_folder(id, path);
            }
            for (entity, record) in records {
                cache.upsert(entity, record);
            }
        });
        tracing::debug!("Entity info reset with {} records", count);
    }

    /// Drop every record inside a reset bracket
    pub fn clear(&mut self) {
        self.reset(std::iter::empty());
    }

    /// Insert or replace the record of an entity.
    ///
    /// A new entity is announced as AddChild to its parent, or to
    /// [`EntityId::ROOT`] when the parent is not cached. A change of parent
    /// is announced as RemoveChild from the old parent followed by AddChild
    /// to the new one. Changes to the children list are announced the same
    /// way: dropped children move to the root, adopted children (including
    /// ones parked for this entity) move here, and a new order fires Order.
    pub fn register(&mut self, entity: EntityId, mut record: CacheRecord) {
        if entity.is_root() {
            tracing::warn!("Cannot register the reserved root id");
            return;
        }
        let old_parent = self
            .cache
            .get(entity)
            .map(|r| self.effective_parent(r.parent, entity));
        let new_parent = self.effective_parent(record.parent, entity);
        let raw_parent = record.parent;

        let mut wanted: Vec<EntityId> = Vec::new();
        for child in std::mem::take(&mut record.children) {
            if child != entity && !wanted.contains(&child) {
                wanted.push(child);
            }
        }

        for child in self.linked_children(entity) {
            if !wanted.contains(&child) {
                self.move_entity(child, entity, EntityId::ROOT);
            }
        }

        // Store only links that already exist; the rest are attached below
        let current = self
            .cache
            .get(entity)
            .map(|r| r.children.clone())
            .unwrap_or_default();
        record.children = current
            .into_iter()
            .filter(|c| wanted.contains(c))
            .filter(|c| !self.cache.contains(*c) || self.is_linked(entity, *c))
            .collect();
        for child in &wanted {
            if !self.cache.contains(*child) && !record.children.contains(child) {
                record.children.push(*child);
            }
        }

        let parked = match old_parent {
            Some(old) if old == new_parent => {
                self.cache.upsert(entity, record);
                Vec::new()
            }
            _ => {
                if let Some(old) = old_parent {
                    self.bracket(
                        EntityInfoEvent::RemoveChild {
                            phase: Phase::Begin,
                            parent: old,
                            child: entity,
                        },
                        |cache| {
                            if old.is_root() {
                                cache.set_parent_link(entity, raw_parent)
                            } else {
                                cache.unlist_child(old, entity)
                            }
                        },
                    );
                }
                self.bracket(
                    EntityInfoEvent::AddChild {
                        phase: Phase::Begin,
                        parent: new_parent,
                        child: entity,
                    },
                    |cache| {
                        let parked = cache.release_awaiting(entity);
                        cache.upsert(entity, record);
                        parked
                    },
                )
            }
        };

        for child in parked.iter().copied() {
            if !wanted.contains(&child) {
                wanted.push(child);
            }
        }
        for child in wanted.iter().copied() {
            if !self.cache.contains(child) || self.is_linked(entity, child) {
                continue;
            }
            let from = self
                .cache
                .get(child)
                .map_or(EntityId::ROOT, |r| self.effective_parent(r.parent, child));
            self.move_entity(child, from, entity);
        }
        for (index, child) in wanted.into_iter().enumerate() {
            self.set_child_index(entity, child, index);
        }
    }

    /// Remove an entity; removing an entity that is not cached is a no-op
    pub fn destroy(&mut self, entity: EntityId) -> Option<CacheRecord> {
        let Some(record) = self.cache.get(entity) else {
            tracing::debug!("Destroy of uncached entity {}", entity);
            return None;
        };
        let parent = self.effective_parent(record.parent, entity);

        self.bracket(
            EntityInfoEvent::RemoveChild {
                phase: Phase::Begin,
                parent,
                child: entity,
            },
            |cache| cache.remove(entity),
        )
    }

    /// Make `child` the last child of `parent`, detaching it from its
    /// current parent first
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        if parent == child || !self.cache.contains(parent) {
            tracing::debug!("Cannot add {} under uncached parent {}", child, parent);
            return false;
        }
        let Some(current) = self
            .cache
            .get(child)
            .map(|r| self.effective_parent(r.parent, child))
        else {
            tracing::debug!("Cannot add uncached child {} under {}", child, parent);
            return false;
        };
        if current == parent {
            return false;
        }
        self.move_entity(child, current, parent)
    }

    /// Detach `child` from `parent`; a cached child becomes top-level and
    /// is announced as AddChild to [`EntityId::ROOT`]
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        if parent.is_root() {
            return false;
        }
        let linked = self.cache.get(parent).is_some_and(|r| r.has_child(child))
            || self.cache.get(child).is_some_and(|r| r.parent == Some(parent));
        if !linked {
            return false;
        }

        if !self.cache.contains(parent) || !self.cache.contains(child) {
            // Only a parked or dangling link to cut
            return self.bracket(
                EntityInfoEvent::RemoveChild {
                    phase: Phase::Begin,
                    parent,
                    child,
                },
                |cache| cache.detach_child(parent, child),
            );
        }
        self.move_entity(child, parent, EntityId::ROOT)
    }

    /// Move `child` under `parent`, or make it top-level with `None`
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        match parent {
            Some(parent) => self.add_child(parent, child),
            None => match self.cache.get(child).and_then(|r| r.parent) {
                Some(old) => self.remove_child(old, child),
                None => false,
            },
        }
    }

    /// Move `child` to `index` among its siblings.
    ///
    /// The index is clamped to the last position. Returns the index the
    /// child ended up at, or `None` if `parent` does not list `child`.
    pub fn set_child_index(
        &mut self,
        parent: EntityId,
        child: EntityId,
        index: usize,
    ) -> Option<usize> {
        let record = self.cache.get(parent)?;
        let current = record.child_index(child)?;
        let target = index.min(record.child_count() - 1);
        if current == target {
            return Some(current);
        }

        self.bracket(
            EntityInfoEvent::Order {
                phase: Phase::Begin,
                parent,
                child,
                index: target as u64,
            },
            |cache| cache.move_child(parent, child, target),
        )
    }

    /// Set the selection of an entity
    pub fn set_selected(&mut self, entity: EntityId, selected: bool) -> bool {
        let changed = self.cache.set_selected(entity, selected);
        if changed {
            self.notify(EntityInfoEvent::Selection { entity, selected });
        }
        changed
    }

    /// Set the lock of an entity
    pub fn set_locked(&mut self, entity: EntityId, locked: bool) -> bool {
        let changed = self.cache.set_locked(entity, locked);
        if changed {
            self.notify(EntityInfoEvent::Locked { entity, locked });
        }
        changed
    }

    /// Set the visibility of an entity
    pub fn set_visible(&mut self, entity: EntityId, visible: bool) -> bool {
        let changed = self.cache.set_visible(entity, visible);
        if changed {
            self.notify(EntityInfoEvent::Visibility { entity, visible });
        }
        changed
    }

    /// Rename an entity
    pub fn set_name(&mut self, entity: EntityId, name: &str) -> bool {
        let changed = self.cache.set_name(entity, name);
        if changed {
            self.notify(EntityInfoEvent::Name {
                entity,
                name: name.to_string(),
            });
        }
        changed
    }

    /// Mark an entity's thumbnail stale
    pub fn mark_dirty(&mut self, entity: EntityId) -> bool {
        self.cache.mark_dirty(entity)
    }

    /// Forget the stale mark of an entity
    pub fn clear_dirty(&mut self, entity: EntityId) {
        self.cache.clear_dirty(entity);
    }

    /// Check if an entity's thumbnail is known to be stale
    pub fn is_dirty(&self, entity: EntityId) -> bool {
        self.cache.is_dirty(entity)
    }

    /// Store a regenerated thumbnail and clear the stale mark
    pub fn apply_thumbnail(&mut self, entity: EntityId, thumbnail: Thumbnail) -> bool {
        if !self.cache.set_thumbnail(entity, thumbnail) {
            return false;
        }
        self.cache.clear_dirty(entity);
        self.notify(EntityInfoEvent::Thumbnail { entity });
        true
    }

    /// Register the root path of a scan folder
    pub fn register_scan_folder(&mut self, id: i64, path: impl Into<PathBuf>) {
        self.cache.register_scan_folder(id, path);
    }

    /// Move `child` from `from` to `to` (either may be the root) as a
    /// RemoveChild bracket followed by an AddChild bracket
    fn move_entity(&mut self, child: EntityId, from: EntityId, to: EntityId) -> bool {
        if from == to {
            return false;
        }
        self.bracket(
            EntityInfoEvent::RemoveChild {
                phase: Phase::Begin,
                parent: from,
                child,
            },
            |cache| {
                if from.is_root() {
                    cache.set_parent_link(child, Some(to))
                } else {
                    cache.unlist_child(from, child)
                }
            },
        );
        self.bracket(
            EntityInfoEvent::AddChild {
                phase: Phase::Begin,
                parent: to,
                child,
            },
            |cache| {
                if to.is_root() {
                    cache.set_parent_link(child, None)
                } else {
                    cache.attach_child(to, child, None).is_some()
                }
            },
        )
    }

    /// Cached children of `parent` that point back at it
    fn linked_children(&self, parent: EntityId) -> Vec<EntityId> {
        self.cache
            .get(parent)
            .map(|r| {
                r.children
                    .iter()
                    .copied()
                    .filter(|c| self.is_linked(parent, *c))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_linked(&self, parent: EntityId, child: EntityId) -> bool {
        self.cache.get(parent).is_some_and(|r| r.has_child(child))
            && self.cache.get(child).is_some_and(|r| r.parent == Some(parent))
    }

    /// Parent used in notifications: the cached parent or the root
    fn effective_parent(&self, parent: Option<EntityId>, entity: EntityId) -> EntityId {
        parent
            .filter(|p| *p != entity && self.cache.contains(*p))
            .unwrap_or(EntityId::ROOT)
    }

    fn notify(&mut self, event: EntityInfoEvent) {
        self.notifier.dispatch(&event, &self.cache);
    }

    /// Run `mutate` between the Begin and End phase of `event`
    fn bracket<R>(
        &mut self,
        event: EntityInfoEvent,
        mutate: impl FnOnce(&mut HierarchyCache) -> R,
    ) -> R {
        self.notifier
            .dispatch(&event.with_phase(Phase::Begin), &self.cache);
        let result = mutate(&mut self.cache);
        self.notifier
            .dispatch(&event.with_phase(Phase::End), &self.cache);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{EventKind, FnHandler};
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<EntityInfoEvent>>>;

    fn subscribe_log(service: &mut EntityInfoService, address: impl Into<Address>) -> Log {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        service.subscribe(
            address,
            FnHandler::new(EventKind::ALL, move |event: &EntityInfoEvent, _: &HierarchyCache| {
                sink.lock().push(event.clone());
            }),
        );
        log
    }

    fn id(n: u64) -> EntityId {
        EntityId(n)
    }

    fn assert_consistent(cache: &HierarchyCache) {
        for (entity, record) in cache.iter() {
            if let Some(parent) = record.parent.and_then(|p| cache.get(p)) {
                assert!(parent.has_child(entity), "{entity} missing from its parent");
            }
            for child in &record.children {
                if let Some(child_record) = cache.get(*child) {
                    assert_eq!(child_record.parent, Some(entity), "{child} parent mismatch");
                }
            }
        }
    }

    fn kinds(log: &Log) -> Vec<(EventKind, Option<Phase>)> {
        log.lock().iter().map(|e| (e.kind(), e.phase())).collect()
    }

    #[test]
    fn test_register_builds_hierarchy() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("A"));
        service.register(id(2), CacheRecord::new("B").with_parent(id(1)));

        assert_eq!(service.cache().get(id(1)).unwrap().children, vec![id(2)]);
        assert_eq!(service.cache().get(id(2)).unwrap().parent, Some(id(1)));
    }

    #[test]
    fn test_subscriber_receives_only_its_entity() {
        let mut service = EntityInfoService::new();
        for n in [1, 2, 5, 6] {
            service.register(id(n), CacheRecord::new(format!("E{n}")));
        }
        let log = subscribe_log(&mut service, id(5));

        service.add_child(id(1), id(2));
        assert!(log.lock().is_empty());

        service.add_child(id(5), id(6));
        assert_eq!(
            *log.lock(),
            vec![
                EntityInfoEvent::AddChild {
                    phase: Phase::Begin,
                    parent: id(5),
                    child: id(6)
                },
                EntityInfoEvent::AddChild {
                    phase: Phase::End,
                    parent: id(5),
                    child: id(6)
                },
            ]
        );
    }

    #[test]
    fn test_begin_sees_old_state_and_end_sees_new() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("Parent"));
        service.register(id(2), CacheRecord::new("Child"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        service.subscribe(
            id(1),
            FnHandler::new(&[EventKind::AddChild], move |event: &EntityInfoEvent, cache: &HierarchyCache| {
                let count = cache.get(id(1)).map_or(0, |r| r.child_count());
                sink.lock().push((event.phase(), count));
            }),
        );

        service.add_child(id(1), id(2));
        assert_eq!(
            *seen.lock(),
            vec![(Some(Phase::Begin), 0), (Some(Phase::End), 1)]
        );
    }

    #[test]
    fn test_reorder_is_visible_after_end() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("Root"));
        for n in 10..13 {
            service.register(id(n), CacheRecord::new(format!("C{n}")).with_parent(id(1)));
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        service.subscribe(
            id(1),
            FnHandler::new(&[EventKind::Order], move |event: &EntityInfoEvent, cache: &HierarchyCache| {
                let position = cache.get(id(1)).and_then(|r| r.child_index(id(12)));
                sink.lock().push((event.clone(), position));
            }),
        );

        assert_eq!(service.set_child_index(id(1), id(12), 0), Some(0));
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            (
                EntityInfoEvent::Order {
                    phase: Phase::Begin,
                    parent: id(1),
                    child: id(12),
                    index: 0
                },
                Some(2)
            )
        );
        assert_eq!(seen[1].0.phase(), Some(Phase::End));
        assert_eq!(seen[1].1, Some(0));
        assert_eq!(
            service.cache().get(id(1)).unwrap().children,
            vec![id(12), id(10), id(11)]
        );
    }

    #[test]
    fn test_reorder_index_is_clamped() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("Root"));
        service.register(id(2), CacheRecord::new("A").with_parent(id(1)));
        service.register(id(3), CacheRecord::new("B").with_parent(id(1)));
        let log = subscribe_log(&mut service, id(1));

        assert_eq!(service.set_child_index(id(1), id(2), 50), Some(1));
        assert!(matches!(
            log.lock()[0],
            EntityInfoEvent::Order { index: 1, .. }
        ));

        // Already in place: no events
        log.lock().clear();
        assert_eq!(service.set_child_index(id(1), id(2), 1), Some(1));
        assert!(log.lock().is_empty());
        assert_eq!(service.set_child_index(id(1), id(9), 0), None);
    }

    #[test]
    fn test_reset_brackets_clear() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("Old"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        service.subscribe(
            Address::Any,
            FnHandler::new(&[EventKind::Reset], move |event: &EntityInfoEvent, cache: &HierarchyCache| {
                sink.lock().push((event.phase(), cache.contains(id(1)), cache.len()));
            }),
        );

        service.reset([(id(2), CacheRecord::new("New")), (id(3), CacheRecord::new("New"))]);
        assert_eq!(
            *seen.lock(),
            vec![(Some(Phase::Begin), true, 1), (Some(Phase::End), false, 2)]
        );
    }

    #[test]
    fn test_mutation_outside_bracket_is_detectable() {
        // Audit: the cache revision may only move between a Begin and its End
        let mut service = EntityInfoService::new();
        let audit = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&audit);
        service.subscribe(
            Address::Any,
            FnHandler::new(EventKind::STRUCTURAL, move |event: &EntityInfoEvent, cache: &HierarchyCache| {
                sink.lock().push((event.phase(), cache.revision()));
            }),
        );

        service.reset([(id(1), CacheRecord::new("A"))]);
        let last_end = audit.lock().last().map(|(_, revision)| *revision);
        assert_eq!(last_end, Some(service.cache().revision()));

        // A bare cache cleared without the bracket changes revision silently
        let mut bare = HierarchyCache::new();
        bare.upsert(id(1), CacheRecord::new("A"));
        let observed = bare.revision();
        bare.clear();
        assert_ne!(bare.revision(), observed);
    }

    #[test]
    fn test_destroy_fires_remove_child() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("Parent"));
        service.register(id(2), CacheRecord::new("Child").with_parent(id(1)));
        let log = subscribe_log(&mut service, id(1));

        assert!(service.destroy(id(2)).is_some());
        assert!(service.destroy(id(2)).is_none());
        assert_eq!(log.lock().len(), 2);
        assert!(matches!(
            log.lock()[1],
            EntityInfoEvent::RemoveChild {
                phase: Phase::End,
                ..
            }
        ));
        assert!(service.cache().get(id(1)).unwrap().children.is_empty());
    }

    #[test]
    fn test_reparent_fires_remove_then_add() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("A"));
        service.register(id(2), CacheRecord::new("B"));
        service.register(id(3), CacheRecord::new("C").with_parent(id(1)));
        let log = subscribe_log(&mut service, Address::Any);

        assert!(service.set_parent(id(3), Some(id(2))));
        let kinds: Vec<_> = log.lock().iter().map(|e| (e.kind(), e.phase())).collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::RemoveChild, Some(Phase::Begin)),
                (EventKind::RemoveChild, Some(Phase::End)),
                (EventKind::AddChild, Some(Phase::Begin)),
                (EventKind::AddChild, Some(Phase::End)),
            ]
        );
        assert_eq!(service.cache().get(id(2)).unwrap().children, vec![id(3)]);

        assert!(service.set_parent(id(3), None));
        assert_eq!(service.cache().get(id(3)).unwrap().parent, None);
    }

    #[test]
    fn test_register_with_new_parent_announces_move() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("A"));
        service.register(id(2), CacheRecord::new("B"));
        service.register(id(3), CacheRecord::new("C").with_parent(id(1)));
        let log = subscribe_log(&mut service, Address::Any);

        service.register(id(3), CacheRecord::new("C").with_parent(id(2)));
        let kinds: Vec<_> = log.lock().iter().map(EntityInfoEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::RemoveChild,
                EventKind::RemoveChild,
                EventKind::AddChild,
                EventKind::AddChild
            ]
        );
        assert!(service.cache().get(id(1)).unwrap().children.is_empty());
        assert_eq!(service.cache().get(id(2)).unwrap().children, vec![id(3)]);
    }

    #[test]
    fn test_top_level_changes_are_announced_on_root() {
        let mut service = EntityInfoService::new();
        let log = subscribe_log(&mut service, EntityId::ROOT);

        service.register(id(1), CacheRecord::new("A"));
        service.register(id(2), CacheRecord::new("B").with_parent(id(1)));
        assert_eq!(
            *log.lock(),
            vec![
                EntityInfoEvent::AddChild {
                    phase: Phase::Begin,
                    parent: EntityId::ROOT,
                    child: id(1)
                },
                EntityInfoEvent::AddChild {
                    phase: Phase::End,
                    parent: EntityId::ROOT,
                    child: id(1)
                },
            ]
        );

        log.lock().clear();
        assert!(service.set_parent(id(2), None));
        assert_eq!(service.cache().roots(), vec![id(1), id(2)]);
        assert!(matches!(
            log.lock().last(),
            Some(EntityInfoEvent::AddChild {
                phase: Phase::End,
                child,
                ..
            }) if *child == id(2)
        ));

        log.lock().clear();
        assert!(service.destroy(id(2)).is_some());
        assert_eq!(log.lock().len(), 2);
        assert!(service.cache().get(EntityId::ROOT).is_none());
    }

    #[test]
    fn test_detach_after_parent_destroyed_stays_detached() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("A"));
        service.register(id(2), CacheRecord::new("B").with_parent(id(1)));

        service.destroy(id(1));
        assert!(service.set_parent(id(2), None));
        service.register(id(1), CacheRecord::new("A"));

        assert_eq!(service.cache().get(id(2)).unwrap().parent, None);
        assert!(service.cache().get(id(1)).unwrap().children.is_empty());
        assert_consistent(service.cache());
    }

    #[test]
    fn test_register_dropping_children_announces_them() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("A"));
        service.register(id(3), CacheRecord::new("C").with_parent(id(1)));
        let on_parent = subscribe_log(&mut service, id(1));
        let on_root = subscribe_log(&mut service, EntityId::ROOT);

        service.register(id(1), CacheRecord::new("A renamed"));

        assert_eq!(service.cache().get(id(3)).unwrap().parent, None);
        assert_eq!(service.cache().roots(), vec![id(1), id(3)]);
        assert_eq!(
            kinds(&on_parent),
            vec![
                (EventKind::RemoveChild, Some(Phase::Begin)),
                (EventKind::RemoveChild, Some(Phase::End)),
            ]
        );
        assert_eq!(
            kinds(&on_root),
            vec![
                (EventKind::AddChild, Some(Phase::Begin)),
                (EventKind::AddChild, Some(Phase::End)),
            ]
        );
        assert_consistent(service.cache());
    }

    #[test]
    fn test_register_adopting_children_announces_them() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("A"));
        service.register(id(2), CacheRecord::new("B"));
        service.register(id(3), CacheRecord::new("C").with_parent(id(2)));
        let on_a = subscribe_log(&mut service, id(1));
        let on_b = subscribe_log(&mut service, id(2));

        service.register(id(1), CacheRecord::new("A").with_children([id(3)]));

        assert_eq!(service.cache().get(id(3)).unwrap().parent, Some(id(1)));
        assert!(service.cache().get(id(2)).unwrap().children.is_empty());
        assert_eq!(kinds(&on_b)[0], (EventKind::RemoveChild, Some(Phase::Begin)));
        assert_eq!(kinds(&on_a)[0], (EventKind::AddChild, Some(Phase::Begin)));
        assert_consistent(service.cache());
    }

    #[test]
    fn test_parked_children_are_announced_when_parent_arrives() {
        let mut service = EntityInfoService::new();
        service.register(id(2), CacheRecord::new("B").with_parent(id(1)));
        assert_eq!(service.cache().roots(), vec![id(2)]);
        let on_a = subscribe_log(&mut service, id(1));
        let on_root = subscribe_log(&mut service, EntityId::ROOT);

        service.register(id(1), CacheRecord::new("A"));

        assert_eq!(service.cache().get(id(1)).unwrap().children, vec![id(2)]);
        assert_eq!(service.cache().roots(), vec![id(1)]);
        assert_eq!(
            kinds(&on_a),
            vec![
                (EventKind::AddChild, Some(Phase::Begin)),
                (EventKind::AddChild, Some(Phase::End)),
            ]
        );
        assert_eq!(
            kinds(&on_root),
            vec![
                (EventKind::AddChild, Some(Phase::Begin)),
                (EventKind::AddChild, Some(Phase::End)),
                (EventKind::RemoveChild, Some(Phase::Begin)),
                (EventKind::RemoveChild, Some(Phase::End)),
            ]
        );
        assert_consistent(service.cache());
    }

    #[test]
    fn test_register_with_new_child_order_fires_order() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("A"));
        service.register(id(2), CacheRecord::new("B").with_parent(id(1)));
        service.register(id(3), CacheRecord::new("C").with_parent(id(1)));
        let log = subscribe_log(&mut service, id(1));

        service.register(id(1), CacheRecord::new("A").with_children([id(3), id(2)]));

        assert_eq!(
            service.cache().get(id(1)).unwrap().children,
            vec![id(3), id(2)]
        );
        assert_eq!(
            kinds(&log),
            vec![
                (EventKind::Order, Some(Phase::Begin)),
                (EventKind::Order, Some(Phase::End)),
            ]
        );
    }

    #[test]
    fn test_detach_to_root_brackets_each_step() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("A"));
        service.register(id(3), CacheRecord::new("C").with_parent(id(1)));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        service.subscribe(
            EntityId::ROOT,
            FnHandler::new(&[EventKind::AddChild], move |event: &EntityInfoEvent, cache: &HierarchyCache| {
                sink.lock().push((event.phase(), cache.roots().contains(&id(3))));
            }),
        );

        assert!(service.remove_child(id(1), id(3)));
        assert_eq!(
            *seen.lock(),
            vec![(Some(Phase::Begin), false), (Some(Phase::End), true)]
        );
        assert_consistent(service.cache());
    }

    #[test]
    fn test_scan_folders_land_inside_reset() {
        let mut service = EntityInfoService::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        service.subscribe(
            Address::Any,
            FnHandler::new(&[EventKind::Reset], move |event: &EntityInfoEvent, cache: &HierarchyCache| {
                if event.phase() == Some(Phase::End) {
                    sink.lock().push((cache.scan_folder(4).is_some(), cache.revision()));
                }
            }),
        );

        service.reset_with_scan_folders([(id(1), CacheRecord::new("assets"))], [(4, "assets")]);
        assert_eq!(*seen.lock(), vec![(true, service.cache().revision())]);
    }

    #[test]
    fn test_property_events_fire_once_after_change() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("Lamp"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        service.subscribe(
            id(1),
            FnHandler::new(&[EventKind::Name, EventKind::Locked], move |event: &EntityInfoEvent, cache: &HierarchyCache| {
                let record = cache.get(id(1)).cloned();
                sink.lock().push((event.clone(), record.map(|r| (r.name.clone(), r.is_locked()))));
            }),
        );

        assert!(service.set_name(id(1), "Desk Lamp"));
        assert!(!service.set_name(id(1), "Desk Lamp"));
        assert!(service.set_locked(id(1), true));
        assert!(!service.set_selected(id(1), false));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, Some(("Desk Lamp".to_string(), false)));
        assert_eq!(seen[1].1, Some(("Desk Lamp".to_string(), true)));
    }

    #[test]
    fn test_operations_on_uncached_entities() {
        let mut service = EntityInfoService::new();
        let log = subscribe_log(&mut service, Address::Any);

        assert!(!service.add_child(id(1), id(2)));
        assert!(!service.remove_child(id(1), id(2)));
        assert!(!service.set_visible(id(1), false));
        assert!(!service.mark_dirty(id(1)));
        assert!(service.destroy(id(1)).is_none());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_apply_thumbnail_clears_dirty() {
        let mut service = EntityInfoService::new();
        service.register(id(1), CacheRecord::new("rock.png"));
        let log = subscribe_log(&mut service, id(1));

        assert!(service.mark_dirty(id(1)));
        let thumbnail = Thumbnail {
            width: 1,
            height: 1,
            pixels: vec![255, 0, 0, 255],
        };
        assert!(service.apply_thumbnail(id(1), thumbnail.clone()));
        assert!(!service.is_dirty(id(1)));
        assert_eq!(
            service.cache().get(id(1)).unwrap().thumbnail,
            Some(thumbnail)
        );
        assert_eq!(*log.lock(), vec![EntityInfoEvent::Thumbnail { entity: id(1) }]);
    }

    #[test]
    fn test_with_config_installs_logger() {
        let config = CacheConfig {
            log_events: true,
            ..Default::default()
        };
        let mut service = EntityInfoService::with_config(&config);
        service.register(id(1), CacheRecord::new("A"));
        assert!(service.set_selected(id(1), true));
        assert_eq!(service.notifier.handler_count(), 1);
    }
}
