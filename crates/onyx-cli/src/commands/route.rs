use anyhow::Result;
use colored::Colorize;
use onyx_router::path::split_href;
use onyx_router::{normalize_path, Params, Resolution, RouteMatcher};
use onyx_server::Config;
use std::collections::BTreeMap;
use std::path::PathBuf;

fn print_params(params: &Params) {
    // Sorted for stable output
    let sorted: BTreeMap<_, _> = params.iter().collect();
    for (name, value) in sorted {
        println!("  {} {} = {}", "•".cyan(), name, value);
    }
}

pub async fn execute(config: &Config, dir: Option<PathBuf>, href: &str) -> Result<()> {
    let manifest = super::scan_manifest(config, super::routes_dir(config, dir)).await?;
    let matcher = RouteMatcher::new(&manifest)?;

    let (raw, _) = split_href(href);
    let path = normalize_path(raw);

    if let Some(found) = matcher.match_api(&path) {
        println!(
            "{} {} {}",
            "api".green().bold(),
            found.entry.page,
            format!("({})", found.entry.file).dimmed()
        );
        print_params(&found.params);
        return Ok(());
    }

    match matcher.resolve(&path) {
        Resolution::Route(found) => {
            println!(
                "{} {} {}",
                format!("{:?}", found.entry.kind).to_lowercase().green().bold(),
                found.entry.page,
                format!("({})", found.entry.file).dimmed()
            );
            if let Some(layouts) = &found.entry.layouts {
                for layout in layouts {
                    println!("  {} layout {}", "↳".cyan(), layout);
                }
            }
            print_params(&found.params);
        }
        Resolution::Boundary(found) => {
            println!(
                "{} {} {}",
                "404".yellow().bold(),
                found.entry.page,
                format!("({})", found.entry.file).dimmed()
            );
        }
        Resolution::Default => {
            println!("{} no route or boundary matches {}", "404".red().bold(), path);
        }
    }
    Ok(())
}
