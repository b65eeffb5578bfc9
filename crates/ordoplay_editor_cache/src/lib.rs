// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity info cache for `OrdoPlay` Editor.
//!
//! This crate keeps a fast, derived view of the editor hierarchy:
//! - Parent/child structure with per-level sort order
//! - Display state (name, selection, visibility, lock)
//! - Template provenance and override flags
//! - Secondary lookups by UUID, file, source and product asset ids
//! - Stale thumbnail tracking with background regeneration
//!
//! ## Architecture
//!
//! [`EntityInfoService`] owns a [`HierarchyCache`] and a [`ChangeNotifier`].
//! Every structural mutation goes through the service and is bracketed by a
//! Begin/End event pair, so subscribers can compare the cache before and
//! after the change. Handlers only ever receive a shared reference to the
//! cache while an event is dispatched.

pub mod cache;
pub mod config;
pub mod error;
pub mod id;
pub mod notify;
pub mod record;
pub mod service;
pub mod thumbnail;

pub use cache::HierarchyCache;
pub use config::CacheConfig;
pub use error::{ConfigError, ThumbnailError};
pub use id::{AssetId, CacheKey, EntityId, SecondaryKey};
pub use notify::{
    Address, ChangeNotifier, EntityInfoEvent, EntityInfoHandler, EventKind, FnHandler, Phase,
    SubscriptionId, TracingHandler,
};
pub use record::{CacheRecord, EntityFlags, TemplateInfo, Thumbnail};
pub use service::EntityInfoService;
pub use thumbnail::ThumbnailRefresher;
