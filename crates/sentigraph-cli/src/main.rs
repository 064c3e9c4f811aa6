//! Sentigraph CLI
//!
//! Loads market prices and social posts into Neo4j and scores the posts
//! with a remote sentiment model.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::Cli;

/// Initialize tracing, optionally teeing to a log file.
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(log_file: Option<&std::path::Path>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sentigraph=info,sentigraph_pipeline=info".into());

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(stderr_layer).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `.env` values reach clap's `env` fallbacks.
    sentigraph_core::config::load_dotenv();
    let cli = Cli::parse();

    init_tracing(cli.log.as_deref())?;
    cli.execute().await
}
