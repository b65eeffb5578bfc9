// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` Editor host
//!
//! Loads a scene, mirrors it into the entity info cache and prints the
//! resulting outline. With an asset directory, the directory is scanned into
//! the asset cache and thumbnails are generated for previewable files.
//!
//! ```text
//! ordoplay_editor [scene.ron] [asset_dir]
//! ```

use ordoplay_editor_app::assets::AssetError;
use ordoplay_editor_app::scene::{SceneData, SceneError};
use ordoplay_editor_app::EditorHost;
use ordoplay_editor_cache::config::CONFIG_FILE_NAME;
use ordoplay_editor_cache::{CacheConfig, ConfigError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How long to wait for thumbnails before printing the asset summary
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(10);

/// Startup errors
#[derive(Debug, Error)]
enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Asset error: {0}")]
    Assets(#[from] AssetError),
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("ordoplay_editor_app=debug,ordoplay_editor_cache=info")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OrdoPlay Editor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("Editor failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let scene_path = args.next();
    let asset_dir = args.next();

    let config = CacheConfig::load(&PathBuf::from(CONFIG_FILE_NAME))?;
    let scene = match &scene_path {
        Some(path) => SceneData::load(path)?,
        None => {
            tracing::info!("No scene given, using the starter scene");
            SceneData::starter()
        }
    };

    let mut host = EditorHost::new(&config, scene);
    print!("{}", host.outline().render());

    if let Some(dir) = asset_dir {
        let summary = host.scan_assets(&dir)?;
        let applied = host.refresh_thumbnails(THUMBNAIL_TIMEOUT);
        println!(
            "{}: {} folders, {} files, {} thumbnails",
            dir.display(),
            summary.folders,
            summary.files,
            applied
        );
    }
    Ok(())
}
