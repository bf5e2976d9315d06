mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use onyx_server::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onyx")]
#[command(version, about = "Onyx CLI - file-system routes, loaders and masks", long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = "onyx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the routes manifest as JSON
    Manifest {
        /// Routes directory (defaults to `routing.dir`)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Show which route a path resolves to
    Match {
        /// Request path, optionally with a query string
        path: String,

        /// Routes directory (defaults to `routing.dir`)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Apply the configured masks to a path
    Mask {
        /// Actual path, or a displayed path carrying a `__` suffix
        path: String,
    },

    /// Serve the routes directory with the shell renderer
    Dev {
        /// Port to run the server on (defaults to `server.port`)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Prerender SSG routes to static HTML
    Build {
        /// Output directory
        #[arg(short, long, default_value = "dist")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Manifest { dir, pretty } => {
            commands::manifest::execute(&config, dir, pretty).await?;
        }
        Commands::Match { path, dir } => {
            commands::route::execute(&config, dir, &path).await?;
        }
        Commands::Mask { path } => {
            commands::mask::execute(&config, &path)?;
        }
        Commands::Dev { port } => {
            commands::dev::execute(&config, port).await?;
        }
        Commands::Build { out } => {
            commands::build::execute(&config, &out).await?;
        }
    }

    Ok(())
}
