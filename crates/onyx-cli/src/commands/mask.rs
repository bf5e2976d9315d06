use anyhow::Result;
use colored::Colorize;
use onyx_router::mask::split_unmask_suffix;
use onyx_server::Config;

pub fn execute(config: &Config, path: &str) -> Result<()> {
    let engine = config.mask_engine()?;
    if engine.is_empty() {
        println!("{}", "No masks configured".yellow());
        return Ok(());
    }

    if let Some((displayed, actual)) = split_unmask_suffix(path) {
        println!("{} {}", "displayed".cyan(), displayed);
        println!("{} {}", "actual   ".cyan(), actual);
        println!("{} {}", "on reload".cyan(), engine.resolve_initial(path, None));
        return Ok(());
    }

    match engine.find(path) {
        Some(found) => {
            println!("{} {}", "masked".green().bold(), found.masked_path);
            if found.unmask_on_reload {
                println!("  {} unmasks on reload", "↳".cyan());
            }
        }
        None => println!("{} {}", "unmasked".dimmed(), path),
    }
    Ok(())
}
