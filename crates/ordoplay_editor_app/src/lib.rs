// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` Editor host library.
//!
//! - [`scene`]: scene data, the source of truth for entities
//! - [`host`]: keeps the entity and asset caches in step with the scene
//! - [`outline`]: tree view rows rebuilt from cache notifications
//! - [`assets`]: asset folder scanning into an asset cache

pub mod assets;
pub mod host;
pub mod outline;
pub mod scene;

pub use host::EditorHost;
