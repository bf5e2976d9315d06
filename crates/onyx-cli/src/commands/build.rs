use anyhow::{Context, Result};
use colored::Colorize;
use onyx_server::{
    Config, Dispatcher, FsRouteScanner, PrerenderedPage, RouteTable, ShellRenderer,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `/` becomes `index.html`, `/a/b` becomes `a/b/index.html`.
fn output_file(out: &Path, path: &str) -> PathBuf {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        out.join("index.html")
    } else {
        out.join(trimmed).join("index.html")
    }
}

/// Why `page` is left out of the output, if it is.
fn skip_reason(page: &PrerenderedPage) -> Option<String> {
    match &page.redirect {
        Some(location) => Some(format!("→ {}", location)),
        None if page.is_skipped() => Some(format!("({})", page.status)),
        None => None,
    }
}

pub async fn execute(config: &Config, out: &Path) -> Result<()> {
    let scanner = FsRouteScanner::new(&config.routing.dir);
    let table =
        RouteTable::load(Arc::new(scanner), config.routing.default_loader_mode.into()).await?;
    let dispatcher = Dispatcher::new(table, Arc::new(ShellRenderer))
        .with_masks(config.mask_engine()?)
        .with_options(config.into());

    let pages = dispatcher.prerender().await?;
    let mut written = 0;
    for page in &pages {
        if let Some(reason) = skip_reason(page) {
            println!("  {} {} {}", "skip".yellow(), page.path, reason);
            continue;
        }

        let file = output_file(out, &page.path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&file, &page.html)
            .with_context(|| format!("Failed to write {}", file.display()))?;
        println!("  {} {}", "✓".green(), file.display());
        written += 1;
    }

    println!(
        "{} {} pages to {}",
        "Prerendered".green().bold(),
        written,
        out.display()
    );
    Ok(())
}
