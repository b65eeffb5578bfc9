// SPDX-License-Identifier: MIT OR Apache-2.0
//! Outline view - flattened entity tree built from the entity info cache.
//!
//! The view subscribes to every notification and rebuilds its rows once a
//! change has landed (End phase or property events). Rows are what a tree
//! widget would draw: one line per visible entity with its depth.

use ordoplay_editor_cache::{
    EntityId, EntityInfoEvent, EntityInfoHandler, EventKind, HierarchyCache, Phase,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

/// One visible line of the outline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow {
    /// Entity shown on this row
    pub entity: EntityId,
    /// Nesting depth (0 for roots)
    pub depth: usize,
    /// Display name
    pub name: String,
    /// Whether the entity has children
    pub has_children: bool,
    /// Whether the entity is selected
    pub selected: bool,
    /// Whether the entity is hidden
    pub hidden: bool,
    /// Whether the entity is locked
    pub locked: bool,
}

#[derive(Debug, Default)]
struct OutlineState {
    /// Search filter
    filter: String,
    /// Show hidden entities
    show_hidden: bool,
    /// Expanded state per entity
    expanded: HashSet<EntityId>,
    /// Expand every entity, ignoring `expanded`
    expand_all: bool,
    /// Rows from the last rebuild
    rows: Vec<OutlineRow>,
    /// Number of rebuilds so far
    rebuilds: usize,
}

/// Shared handle to the outline; clones observe the same rows
#[derive(Debug, Clone, Default)]
pub struct OutlineView {
    state: Arc<Mutex<OutlineState>>,
}

impl OutlineView {
    /// Create an empty outline with everything expanded
    pub fn new() -> Self {
        let view = Self::default();
        view.state.lock().expand_all = true;
        view
    }

    /// Current rows
    pub fn rows(&self) -> Vec<OutlineRow> {
        self.state.lock().rows.clone()
    }

    /// Number of rebuilds performed
    pub fn rebuild_count(&self) -> usize {
        self.state.lock().rebuilds
    }

    /// Set the search filter and rebuild
    pub fn set_filter(&self, filter: &str, cache: &HierarchyCache) {
        self.state.lock().filter = filter.to_lowercase();
        self.rebuild(cache);
    }

    /// Toggle display of hidden entities and rebuild
    pub fn set_show_hidden(&self, show_hidden: bool, cache: &HierarchyCache) {
        self.state.lock().show_hidden = show_hidden;
        self.rebuild(cache);
    }

    /// Expand or collapse one entity and rebuild
    pub fn set_expanded(&self, entity: EntityId, expanded: bool, cache: &HierarchyCache) {
        {
            let mut state = self.state.lock();
            state.expand_all = false;
            if expanded {
                state.expanded.insert(entity);
            } else {
                state.expanded.remove(&entity);
            }
        }
        self.rebuild(cache);
    }

    /// Collapse every entity and rebuild
    pub fn collapse_all(&self, cache: &HierarchyCache) {
        {
            let mut state = self.state.lock();
            state.expand_all = false;
            state.expanded.clear();
        }
        self.rebuild(cache);
    }

    /// Recompute the rows from the cache
    pub fn rebuild(&self, cache: &HierarchyCache) {
        let mut state = self.state.lock();
        let mut rows = Vec::new();
        for root in cache.roots() {
            push_rows(&state, cache, root, 0, &mut rows);
        }
        state.rows = rows;
        state.rebuilds += 1;
    }

    /// Render the rows as an indented text tree
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in self.state.lock().rows.iter() {
            let marker = if row.selected { "*" } else { " " };
            let lock = if row.locked { " [locked]" } else { "" };
            let hidden = if row.hidden { " (hidden)" } else { "" };
            let _ = writeln!(
                out,
                "{marker} {:indent$}{}{}{}",
                "",
                row.name,
                hidden,
                lock,
                indent = row.depth * 2
            );
        }
        out
    }
}

impl EntityInfoHandler for OutlineView {
    fn interests(&self) -> &'static [EventKind] {
        EventKind::ALL
    }

    fn on_event(&mut self, event: &EntityInfoEvent, cache: &HierarchyCache) {
        // Begin is delivered before the cache changes; wait for the result
        if event.phase() != Some(Phase::Begin) {
            self.rebuild(cache);
        }
    }
}

fn push_rows(
    state: &OutlineState,
    cache: &HierarchyCache,
    entity: EntityId,
    depth: usize,
    rows: &mut Vec<OutlineRow>,
) {
    let Some(record) = cache.get(entity) else {
        return;
    };
    if record.is_hidden() && !state.show_hidden {
        return;
    }
    if !state.filter.is_empty() && !subtree_matches(cache, entity, &state.filter) {
        return;
    }

    rows.push(OutlineRow {
        entity,
        depth,
        name: record.name.clone(),
        has_children: record.child_count() > 0,
        selected: record.is_selected(),
        hidden: record.is_hidden(),
        locked: record.is_locked(),
    });

    if state.expand_all || state.expanded.contains(&entity) {
        for child in &record.children {
            push_rows(state, cache, *child, depth + 1, rows);
        }
    }
}

/// Check if the entity or any descendant matches the filter
fn subtree_matches(cache: &HierarchyCache, entity: EntityId, filter: &str) -> bool {
    let Some(record) = cache.get(entity) else {
        return false;
    };
    record.name.to_lowercase().contains(filter)
        || record
            .children
            .iter()
            .any(|child| subtree_matches(cache, *child, filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_editor_cache::{Address, CacheRecord, EntityInfoService};

    fn service_with_outline() -> (EntityInfoService, OutlineView) {
        let mut service = EntityInfoService::new();
        let outline = OutlineView::new();
        service.subscribe(Address::Any, outline.clone());
        service.register(EntityId(1), CacheRecord::new("World"));
        service.register(EntityId(2), CacheRecord::new("Cube").with_parent(EntityId(1)));
        service.register(EntityId(3), CacheRecord::new("Lamp").with_parent(EntityId(1)));
        (service, outline)
    }

    fn names(outline: &OutlineView) -> Vec<(usize, String)> {
        outline
            .rows()
            .into_iter()
            .map(|row| (row.depth, row.name))
            .collect()
    }

    #[test]
    fn test_rows_follow_notifications() {
        let (mut service, outline) = service_with_outline();
        assert_eq!(
            names(&outline),
            vec![
                (0, "World".to_string()),
                (1, "Cube".to_string()),
                (1, "Lamp".to_string())
            ]
        );

        service.set_child_index(EntityId(1), EntityId(3), 0);
        assert_eq!(outline.rows()[1].name, "Lamp");

        service.set_name(EntityId(2), "Crate");
        assert_eq!(outline.rows()[2].name, "Crate");
    }

    #[test]
    fn test_rebuilds_once_per_bracket() {
        let (mut service, outline) = service_with_outline();
        let before = outline.rebuild_count();
        service.set_parent(EntityId(3), None);
        // RemoveChild from the parent, then AddChild on the root
        assert_eq!(outline.rebuild_count(), before + 2);
        assert_eq!(outline.rows().last().map(|row| row.depth), Some(0));
    }

    #[test]
    fn test_filter_keeps_ancestors() {
        let (service, outline) = service_with_outline();
        outline.set_filter("lam", service.cache());
        assert_eq!(
            names(&outline),
            vec![(0, "World".to_string()), (1, "Lamp".to_string())]
        );
    }

    #[test]
    fn test_collapse_and_expand() {
        let (service, outline) = service_with_outline();
        outline.collapse_all(service.cache());
        assert_eq!(outline.rows().len(), 1);

        outline.set_expanded(EntityId(1), true, service.cache());
        assert_eq!(outline.rows().len(), 3);
    }

    #[test]
    fn test_hidden_rows() {
        let mut service = EntityInfoService::new();
        let outline = OutlineView::new();
        service.subscribe(Address::Any, outline.clone());

        let mut hidden = CacheRecord::new("Ghost");
        hidden.flags.hidden = true;
        service.register(EntityId(1), hidden);
        service.register(EntityId(2), CacheRecord::new("Visible"));
        service.set_selected(EntityId(2), true);

        assert_eq!(outline.rows().len(), 1);
        outline.set_show_hidden(true, service.cache());
        assert_eq!(outline.rows().len(), 2);
        assert!(outline.render().contains("Ghost (hidden)"));
        assert!(outline.render().contains("* Visible"));
    }
}
