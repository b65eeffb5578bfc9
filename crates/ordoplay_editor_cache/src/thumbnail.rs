// SPDX-License-Identifier: MIT OR Apache-2.0
//! Background thumbnail regeneration for stale cache entries.
//!
//! Stale entities are picked from the cache's dirty set and sent to a worker
//! thread. The worker never touches the cache: results come back over a
//! channel and are applied through [`EntityInfoService`] on the thread that
//! owns it.

use crate::config::CacheConfig;
use crate::error::ThumbnailError;
use crate::id::EntityId;
use crate::record::Thumbnail;
use crate::service::EntityInfoService;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Thumbnail request for async generation
#[derive(Debug, Clone)]
struct ThumbnailRequest {
    /// Entity the thumbnail belongs to
    entity: EntityId,
    /// Path to the source file
    path: PathBuf,
    /// Requested edge length
    size: u32,
}

/// Result of thumbnail generation
type ThumbnailResult = (EntityId, Result<Thumbnail, ThumbnailError>);

/// Schedules and collects thumbnail regeneration
pub struct ThumbnailRefresher {
    /// Channel for sending thumbnail requests
    request_tx: mpsc::UnboundedSender<ThumbnailRequest>,
    /// Channel for receiving generated thumbnails
    result_rx: mpsc::UnboundedReceiver<ThumbnailResult>,
    /// Entities with a request in flight
    pending: HashSet<EntityId>,
    /// Thumbnail edge length
    pub thumbnail_size: u32,
    /// Maximum requests in flight
    pub max_pending: usize,
}

impl ThumbnailRefresher {
    /// Create a refresher and spawn its worker thread
    pub fn new(config: &CacheConfig) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        // Spawn the thumbnail generation worker
        let spawned = std::thread::Builder::new()
            .name("thumbnail-worker".to_string())
            .spawn(move || thumbnail_worker(request_rx, result_tx));
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn thumbnail worker: {}", e);
        }

        Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            thumbnail_size: config.thumbnail_size,
            max_pending: config.max_pending_thumbnails,
        }
    }

    /// Number of requests in flight
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is in flight
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue stale entities for regeneration.
    ///
    /// Entities without a previewable source file lose their stale mark
    /// right away. Returns the number of requests sent.
    pub fn schedule(&mut self, service: &mut EntityInfoService) -> usize {
        let mut stale: Vec<EntityId> = service
            .cache()
            .dirty()
            .filter(|entity| !self.pending.contains(entity))
            .collect();
        stale.sort();

        let mut sent = 0;
        for entity in stale {
            if self.pending.len() >= self.max_pending {
                break;
            }
            let path = service
                .cache()
                .get(entity)
                .and_then(|record| record.source_path.clone())
                .filter(|path| can_generate_thumbnail(path));
            let Some(path) = path else {
                service.clear_dirty(entity);
                continue;
            };

            let request = ThumbnailRequest {
                entity,
                path,
                size: self.thumbnail_size,
            };
            if self.request_tx.send(request).is_err() {
                tracing::warn!("Thumbnail worker is gone; {} stays stale", entity);
                break;
            }
            self.pending.insert(entity);
            sent += 1;
        }
        sent
    }

    /// Apply finished thumbnails; returns the number applied
    pub fn pump(&mut self, service: &mut EntityInfoService) -> usize {
        let mut applied = 0;
        while let Ok((entity, result)) = self.result_rx.try_recv() {
            self.pending.remove(&entity);
            match result {
                Ok(thumbnail) => {
                    if service.apply_thumbnail(entity, thumbnail) {
                        applied += 1;
                    }
                }
                Err(ThumbnailError::UnsupportedFormat(format)) => {
                    tracing::debug!("No thumbnail for {} ({})", entity, format);
                    service.clear_dirty(entity);
                }
                Err(e) => {
                    tracing::warn!("Thumbnail generation failed for {}: {}", entity, e);
                    service.clear_dirty(entity);
                }
            }
        }
        applied
    }
}

/// Check if we can generate a thumbnail for this file type
fn can_generate_thumbnail(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    matches!(
        ext.as_deref(),
        Some("png" | "jpg" | "jpeg" | "gif" | "bmp" | "ico" | "tga" | "hdr" | "exr")
    )
}

/// Worker thread that processes thumbnail generation requests
fn thumbnail_worker(
    mut request_rx: mpsc::UnboundedReceiver<ThumbnailRequest>,
    result_tx: mpsc::UnboundedSender<ThumbnailResult>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create thumbnail runtime: {}", e);
            return;
        }
    };

    rt.block_on(async {
        while let Some(request) = request_rx.recv().await {
            let result = generate_thumbnail(&request.path, request.size).await;
            if result_tx.send((request.entity, result)).is_err() {
                break; // Channel closed
            }
        }
    });
}

/// Decode an image file and shrink it to fit `size`
async fn generate_thumbnail(path: &Path, size: u32) -> Result<Thumbnail, ThumbnailError> {
    if !path.exists() {
        return Err(ThumbnailError::NotFound(path.to_path_buf()));
    }
    if !can_generate_thumbnail(path) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("no extension");
        return Err(ThumbnailError::UnsupportedFormat(ext.to_string()));
    }

    let data = tokio::fs::read(path)
        .await
        .map_err(|e| ThumbnailError::Io(e.to_string()))?;
    let image =
        image::load_from_memory(&data).map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    let rgba = image.thumbnail(size, size).to_rgba8();
    Ok(Thumbnail {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}
