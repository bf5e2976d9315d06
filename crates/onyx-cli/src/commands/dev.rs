use anyhow::Result;
use colored::Colorize;
use onyx_server::{Config, Dispatcher, FsRouteScanner, RouteTable, RouteWatcher, ShellRenderer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn execute(config: &Config, port: Option<u16>) -> Result<()> {
    let dir = PathBuf::from(&config.routing.dir);
    let scanner = FsRouteScanner::new(dir.clone());
    let table =
        RouteTable::load(Arc::new(scanner), config.routing.default_loader_mode.into()).await?;

    let snapshot = table.current().await;
    let manifest = &snapshot.manifest;
    println!("{}", "Routes:".cyan().bold());
    for entry in manifest
        .api_routes
        .iter()
        .chain(&manifest.spa_routes)
        .chain(&manifest.ssg_routes)
    {
        println!(
            "  {} {} {}",
            "→".green(),
            entry.page,
            format!("{:?}", entry.kind).to_lowercase().dimmed()
        );
    }

    // Keep the watcher alive for the lifetime of the server
    let _watcher = if config.dev.watch {
        let watcher = RouteWatcher::new(&dir)?;
        watcher.spawn_rebuilder(table.clone());
        Some(watcher)
    } else {
        None
    };

    let dispatcher = Dispatcher::new(table, Arc::new(ShellRenderer))
        .with_masks(config.mask_engine()?)
        .with_options(config.into());
    let app = Arc::new(dispatcher).router();

    let addr = format!("{}:{}", config.server.host, port.unwrap_or(config.server.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    println!("{} http://{}", "Listening on".green().bold(), addr);

    axum::serve(listener, app).await?;
    Ok(())
}
