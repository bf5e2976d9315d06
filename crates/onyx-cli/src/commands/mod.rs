pub mod build;
pub mod dev;
pub mod manifest;
pub mod mask;
pub mod route;

use anyhow::Result;
use onyx_router::{ManifestBuilder, RoutesManifest};
use onyx_server::{Config, FsRouteScanner, RouteSource};
use std::path::PathBuf;

/// Routes directory from the flag, else from config.
pub fn routes_dir(config: &Config, dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| PathBuf::from(&config.routing.dir))
}

/// Scans `dir` and builds its manifest.
pub async fn scan_manifest(config: &Config, dir: PathBuf) -> Result<RoutesManifest> {
    let scanner = FsRouteScanner::new(dir);
    let discovery = scanner.discover().await?;

    let manifest = ManifestBuilder::new(scanner.root())
        .with_default_loader_mode(config.routing.default_loader_mode.into())
        .with_files(discovery.files)
        .build()?;
    Ok(manifest)
}
