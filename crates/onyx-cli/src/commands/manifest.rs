use anyhow::Result;
use onyx_server::Config;
use std::path::PathBuf;

pub async fn execute(config: &Config, dir: Option<PathBuf>, pretty: bool) -> Result<()> {
    let manifest = super::scan_manifest(config, super::routes_dir(config, dir)).await?;

    let json = if pretty {
        serde_json::to_string_pretty(&manifest)?
    } else {
        serde_json::to_string(&manifest)?
    };
    println!("{}", json);
    Ok(())
}
