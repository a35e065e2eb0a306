pub mod charts;
pub mod config;
pub mod data;
pub mod fallback;
pub mod html;
pub mod map;
pub mod members;
pub mod pages;
pub mod render;
pub mod server;
pub mod types;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every page and its data files into the site directory
    Build,
    /// Serve the site, its data files and the member sign-up
    Serve,
    /// Write the sample dataset as pretty JSON
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "sample-data.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let app_config = config::AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Build => {
            info!(config = ?cli.config, "building site");
            render::build_site(&app_config).await?;
        }
        Commands::Serve => {
            server::start_server(app_config).await?;
        }
        Commands::Export { output } => {
            render::export_dataset(&app_config, &output).await?;
        }
    }

    Ok(())
}
