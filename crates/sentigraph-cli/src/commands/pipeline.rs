//! End-to-end pipeline command.

use anyhow::Result;
use clap::Subcommand;

use sentigraph_pipeline::{Pipeline, PipelineRequest};

use super::{cancel_on_ctrl_c, print_json, ClassifierArgs, Neo4jArgs, SourceArgs};
use crate::output;

#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Ingest prices and posts for a ticker, then score the new posts
    Run {
        /// Ticker symbol, e.g. TSLA
        ticker: String,

        /// First day to include (YYYY-MM-DD, default 2015-01-01)
        #[arg(long)]
        start: Option<String>,

        /// Last day to include (YYYY-MM-DD, default 2024-01-01)
        #[arg(long)]
        end: Option<String>,

        /// Rows read per chunk (100-5000)
        #[arg(long, default_value_t = 2000)]
        chunk_size: usize,

        #[command(flatten)]
        sources: SourceArgs,

        #[command(flatten)]
        classifier: ClassifierArgs,

        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
}

pub async fn execute(cmd: PipelineCommands, json: bool) -> Result<()> {
    let PipelineCommands::Run {
        ticker,
        start,
        end,
        chunk_size,
        sources,
        classifier,
        neo4j,
    } = cmd;

    let classifier = classifier.client()?;
    let store = neo4j.connect().await?;
    let cancel = cancel_on_ctrl_c();

    let request = PipelineRequest {
        ticker,
        start_date: start,
        end_date: end,
        chunk_size: Some(chunk_size),
    };
    let summary = Pipeline::new(store, classifier, sources.paths())
        .run(&request, &cancel)
        .await?;

    if json {
        return print_json(&summary);
    }
    output::print_pipeline_summary(&summary);
    Ok(())
}
