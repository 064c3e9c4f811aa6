//! Standalone price sync and post import.

use anyhow::Result;
use clap::{Args, Subcommand};

use sentigraph_pipeline::{import_posts, sync_prices, IngestRequest};

use super::{cancel_on_ctrl_c, print_json, Neo4jArgs, SourceArgs};
use crate::output;

#[derive(Subcommand)]
pub enum IngestCommands {
    /// Upsert daily price bars for one ticker
    Prices(IngestArgs),

    /// Upsert social posts for one ticker
    Posts(IngestArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// Ticker symbol, e.g. TSLA
    pub ticker: String,

    /// First day to include (YYYY-MM-DD, default 2021-09-30)
    #[arg(long)]
    pub start: Option<String>,

    /// Last day to include (YYYY-MM-DD, default 2022-09-30)
    #[arg(long)]
    pub end: Option<String>,

    /// Rows read per chunk (100-5000)
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub neo4j: Neo4jArgs,
}

impl IngestArgs {
    fn request(&self) -> IngestRequest {
        IngestRequest {
            ticker: self.ticker.clone(),
            start_date: self.start.clone(),
            end_date: self.end.clone(),
            chunk_size: Some(self.chunk_size),
        }
    }
}

pub async fn execute(cmd: IngestCommands, json: bool) -> Result<()> {
    let (args, prices) = match &cmd {
        IngestCommands::Prices(args) => (args, true),
        IngestCommands::Posts(args) => (args, false),
    };

    let client = args.neo4j.connect().await?;
    let cancel = cancel_on_ctrl_c();
    let request = args.request();

    let summary = if prices {
        sync_prices(client.as_ref(), &args.sources.prices, &request, &cancel).await?
    } else {
        import_posts(client.as_ref(), &args.sources.posts, &request, &cancel).await?
    };

    if json {
        return print_json(&summary);
    }
    output::print_ingest_summary(&summary);
    Ok(())
}
