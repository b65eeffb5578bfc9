// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications for cached entity info.
//!
//! Structural changes (reset, add child, remove child, reorder) are
//! delivered as a Begin/End pair around the mutation. Property changes
//! (selection, lock, visibility, name, thumbnail) fire once, after the value
//! has changed.

use crate::cache::HierarchyCache;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which side of a structural mutation an event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Fired before the cache changes
    Begin,
    /// Fired after the cache changed
    End,
}

/// Kind of an [`EntityInfoEvent`], used to declare handler interests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Full reset
    Reset,
    /// Child added to a parent
    AddChild,
    /// Child removed from a parent
    RemoveChild,
    /// Child moved within its parent
    Order,
    /// Selection changed
    Selection,
    /// Lock changed
    Locked,
    /// Visibility changed
    Visibility,
    /// Name changed
    Name,
    /// Thumbnail regenerated
    Thumbnail,
}

impl EventKind {
    /// Every event kind
    pub const ALL: &'static [EventKind] = &[
        EventKind::Reset,
        EventKind::AddChild,
        EventKind::RemoveChild,
        EventKind::Order,
        EventKind::Selection,
        EventKind::Locked,
        EventKind::Visibility,
        EventKind::Name,
        EventKind::Thumbnail,
    ];

    /// Kinds delivered as Begin/End pairs
    pub const STRUCTURAL: &'static [EventKind] = &[
        EventKind::Reset,
        EventKind::AddChild,
        EventKind::RemoveChild,
        EventKind::Order,
    ];

    /// Check if this kind is delivered as a Begin/End pair
    pub fn is_structural(&self) -> bool {
        Self::STRUCTURAL.contains(self)
    }
}

/// A change to cached entity info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityInfoEvent {
    /// All records are being replaced
    Reset { phase: Phase },
    /// `child` is being added under `parent`
    AddChild {
        phase: Phase,
        parent: EntityId,
        child: EntityId,
    },
    /// `child` is being removed from `parent`
    RemoveChild {
        phase: Phase,
        parent: EntityId,
        child: EntityId,
    },
    /// `child` is moving to `index` within `parent`
    Order {
        phase: Phase,
        parent: EntityId,
        child: EntityId,
        index: u64,
    },
    /// Selection of `entity` changed
    Selection { entity: EntityId, selected: bool },
    /// Lock of `entity` changed
    Locked { entity: EntityId, locked: bool },
    /// Visibility of `entity` changed
    Visibility { entity: EntityId, visible: bool },
    /// Name of `entity` changed
    Name { entity: EntityId, name: String },
    /// Thumbnail of `entity` was regenerated
    Thumbnail { entity: EntityId },
}

impl EntityInfoEvent {
    /// Get the event kind
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Reset { .. } => EventKind::Reset,
            Self::AddChild { .. } => EventKind::AddChild,
            Self::RemoveChild { .. } => EventKind::RemoveChild,
            Self::Order { .. } => EventKind::Order,
            Self::Selection { .. } => EventKind::Selection,
            Self::Locked { .. } => EventKind::Locked,
            Self::Visibility { .. } => EventKind::Visibility,
            Self::Name { .. } => EventKind::Name,
            Self::Thumbnail { .. } => EventKind::Thumbnail,
        }
    }

    /// Get the phase of a structural event; `None` for immediate events
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Reset { phase }
            | Self::AddChild { phase, .. }
            | Self::RemoveChild { phase, .. }
            | Self::Order { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Entity the event is addressed to: the parent for structural
    /// changes, the subject for property changes, none for a reset
    pub fn address(&self) -> Option<EntityId> {
        match self {
            Self::Reset { .. } => None,
            Self::AddChild { parent, .. }
            | Self::RemoveChild { parent, .. }
            | Self::Order { parent, .. } => Some(*parent),
            Self::Selection { entity, .. }
            | Self::Locked { entity, .. }
            | Self::Visibility { entity, .. }
            | Self::Name { entity, .. }
            | Self::Thumbnail { entity } => Some(*entity),
        }
    }

    /// Copy of a structural event with its phase replaced
    pub fn with_phase(&self, phase: Phase) -> Self {
        let mut event = self.clone();
        match &mut event {
            Self::Reset { phase: p }
            | Self::AddChild { phase: p, .. }
            | Self::RemoveChild { phase: p, .. }
            | Self::Order { phase: p, .. } => *p = phase,
            _ => {}
        }
        event
    }
}

/// Where a handler listens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Every event, including resets
    Any,
    /// Events addressed to one entity
    Entity(EntityId),
}

impl From<EntityId> for Address {
    fn from(id: EntityId) -> Self {
        Address::Entity(id)
    }
}

/// Receiver of entity info events.
///
/// A handler states the event kinds it wants up front; other kinds are
/// never delivered to it. The cache is passed read-only so the handler can
/// query the pre-change state on Begin and the post-change state on End.
pub trait EntityInfoHandler: Send {
    /// Event kinds this handler receives
    fn interests(&self) -> &'static [EventKind];

    /// Handle one event
    fn on_event(&mut self, event: &EntityInfoEvent, cache: &HierarchyCache);
}

/// Handler built from a closure
pub struct FnHandler<F> {
    interests: &'static [EventKind],
    f: F,
}

impl<F> FnHandler<F>
where
    F: FnMut(&EntityInfoEvent, &HierarchyCache),
{
    /// Wrap a closure receiving the given event kinds
    pub fn new(interests: &'static [EventKind], f: F) -> Self {
        Self { interests, f }
    }
}

impl<F> EntityInfoHandler for FnHandler<F>
where
    F: FnMut(&EntityInfoEvent, &HierarchyCache) + Send,
{
    fn interests(&self) -> &'static [EventKind] {
        self.interests
    }

    fn on_event(&mut self, event: &EntityInfoEvent, cache: &HierarchyCache) {
        (self.f)(event, cache);
    }
}

/// Handler that writes every event to the tracing log
#[derive(Debug, Default)]
pub struct TracingHandler;

impl EntityInfoHandler for TracingHandler {
    fn interests(&self) -> &'static [EventKind] {
        EventKind::ALL
    }

    fn on_event(&mut self, event: &EntityInfoEvent, cache: &HierarchyCache) {
        tracing::debug!(?event, records = cache.len(), "entity info event");
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Box<dyn EntityInfoHandler>,
}

impl Subscription {
    fn deliver(&mut self, event: &EntityInfoEvent, cache: &HierarchyCache) -> bool {
        if !self.handler.interests().contains(&event.kind()) {
            return false;
        }
        self.handler.on_event(event, cache);
        true
    }
}

/// Addressed event dispatcher
#[derive(Default)]
pub struct ChangeNotifier {
    /// Handlers listening on one entity
    by_entity: HashMap<EntityId, Vec<Subscription>>,
    /// Handlers listening on everything
    any: Vec<Subscription>,
    /// Next subscription ID
    next_id: u64,
}

impl ChangeNotifier {
    /// Create a notifier with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler at an address
    pub fn subscribe(
        &mut self,
        address: impl Into<Address>,
        handler: impl EntityInfoHandler + 'static,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let subscription = Subscription {
            id,
            handler: Box::new(handler),
        };
        match address.into() {
            Address::Any => self.any.push(subscription),
            Address::Entity(entity) => self
                .by_entity
                .entry(entity)
                .or_default()
                .push(subscription),
        }
        id
    }

    /// Remove a handler; returns `false` if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if let Some(pos) = self.any.iter().position(|s| s.id == id) {
            self.any.remove(pos);
            return true;
        }
        let mut emptied = None;
        let mut found = false;
        for (entity, subscriptions) in &mut self.by_entity {
            if let Some(pos) = subscriptions.iter().position(|s| s.id == id) {
                subscriptions.remove(pos);
                found = true;
                if subscriptions.is_empty() {
                    emptied = Some(*entity);
                }
                break;
            }
        }
        if let Some(entity) = emptied {
            self.by_entity.remove(&entity);
        }
        found
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.any.len() + self.by_entity.values().map(Vec::len).sum::<usize>()
    }

    /// Deliver an event to matching handlers.
    ///
    /// Handlers on the event's entity run first, in subscription order,
    /// then handlers on [`Address::Any`]. Returns the number of handlers
    /// that received the event.
    pub fn dispatch(&mut self, event: &EntityInfoEvent, cache: &HierarchyCache) -> usize {
        let mut delivered = 0;
        if let Some(entity) = event.address() {
            if let Some(subscriptions) = self.by_entity.get_mut(&entity) {
                for subscription in subscriptions {
                    delivered += usize::from(subscription.deliver(event, cache));
                }
            }
        }
        for subscription in &mut self.any {
            delivered += usize::from(subscription.deliver(event, cache));
        }
        delivered
    }
}
