use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod token_store;

use commands::{App, Command};

#[derive(Parser, Debug)]
#[command(name = "gallery", about = "Manage and rearrange a personal image gallery")]
struct Cli {
    /// Defaults to ./gallery.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true)]
    page_size: Option<usize>,
    #[arg(long, global = true)]
    token_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    if let Some(page_size) = cli.page_size.filter(|size| *size > 0) {
        settings.page_size = page_size;
    }
    if let Some(token_path) = cli.token_path {
        settings.token_path = token_path;
    }

    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    App::new(settings)?.run(cli.command).await
}
