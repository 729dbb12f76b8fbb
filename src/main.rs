//! CLI entry point for blogserve

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogserve::config::{self, ServerConfig};
use blogserve::BlogServe;

#[derive(Parser)]
#[command(name = "blogserve")]
#[command(version)]
#[command(about = "A simple markdown blog engine with live reload", long_about = None)]
struct Cli {
    /// Directory containing blog posts
    #[arg(short = 'd', long, global = true, default_value = ".")]
    directory: PathBuf,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ServeArgs {
    /// Port to serve the blog on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// IP address to bind to
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Directory of the built frontend
    #[arg(long, default_value = "frontend/dist")]
    frontend: PathBuf,

    /// Collapse changes arriving within this many milliseconds into one reload
    #[arg(long)]
    debounce_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List posts and the directories that were skipped
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        config::DEBUG_LOG_FILTER
    } else {
        config::DEFAULT_LOG_FILTER
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig {
        root: cli.directory.components().collect(),
        host: cli.serve.host,
        port: cli.serve.port,
        frontend_dir: cli.serve.frontend,
        debounce: cli.serve.debounce_ms.map(Duration::from_millis),
    };
    let app = BlogServe::new(config);

    match cli.command {
        None => {
            tracing::info!("Serving posts from {:?}", app.config.root);
            app.serve().await?;
        }
        Some(Commands::List) => app.list()?,
    }

    Ok(())
}
