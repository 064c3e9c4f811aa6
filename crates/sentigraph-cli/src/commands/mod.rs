//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sentigraph_classifier::{ClassifierConfig, HuggingFaceClient};
use sentigraph_core::config::{DEFAULT_POSTS_CSV, DEFAULT_PRICES_CSV};
use sentigraph_core::SourcePaths;
use sentigraph_graph::{GraphClient, GraphConfig};

pub mod graph;
pub mod ingest;
pub mod pipeline;
pub mod quality;
pub mod sentiment;

/// Sentigraph - market data and social sentiment in a property graph
#[derive(Parser)]
#[command(name = "sentigraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Graph schema and inspection
    #[command(subcommand)]
    Graph(graph::GraphCommands),

    /// Load one CSV source into the graph
    #[command(subcommand)]
    Ingest(ingest::IngestCommands),

    /// Score posts with the sentiment model
    #[command(subcommand)]
    Sentiment(sentiment::SentimentCommands),

    /// Run ingestion and enrichment end to end
    #[command(subcommand)]
    Pipeline(pipeline::PipelineCommands),

    /// Check the CSV sources before ingesting them
    Quality(quality::QualityArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let json = self.json;
        match self.command {
            Commands::Graph(cmd) => graph::execute(cmd, json).await,
            Commands::Ingest(cmd) => ingest::execute(cmd, json).await,
            Commands::Sentiment(cmd) => sentiment::execute(cmd, json).await,
            Commands::Pipeline(cmd) => pipeline::execute(cmd, json).await,
            Commands::Quality(args) => quality::execute(args, json),
        }
    }
}

/// Neo4j connection flags.
#[derive(Args, Debug, Clone)]
pub struct Neo4jArgs {
    /// Bolt URI
    #[arg(long = "neo4j-uri", env = "NEO4J_URI", default_value = "bolt://localhost:7687")]
    pub uri: String,

    #[arg(long = "neo4j-user", env = "NEO4J_USER", default_value = "neo4j")]
    pub user: String,

    #[arg(long = "neo4j-password", env = "NEO4J_PASSWORD", default_value = "password", hide_env_values = true)]
    pub password: String,
}

impl Neo4jArgs {
    pub async fn connect(&self) -> Result<Arc<GraphClient>> {
        let config = GraphConfig {
            uri: self.uri.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        };
        let client = GraphClient::connect(&config).await?;
        info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Arc::new(client))
    }
}

/// Locations of the CSV sources.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Daily price CSV
    #[arg(long, env = "SENTIGRAPH_PRICES_CSV", default_value = DEFAULT_PRICES_CSV)]
    pub prices: PathBuf,

    /// Social post CSV
    #[arg(long, env = "SENTIGRAPH_POSTS_CSV", default_value = DEFAULT_POSTS_CSV)]
    pub posts: PathBuf,
}

impl SourceArgs {
    pub fn paths(&self) -> SourcePaths {
        SourcePaths::new(&self.prices, &self.posts)
    }
}

/// Classifier credentials.
#[derive(Args, Debug, Clone)]
pub struct ClassifierArgs {
    /// Hugging Face API token (falls back to HF_TOKEN)
    #[arg(long = "hf-token", value_name = "TOKEN")]
    pub api_key: Option<String>,
}

impl ClassifierArgs {
    /// Build the client up front so a missing token fails before any fetch.
    pub fn client(&self) -> Result<Arc<HuggingFaceClient>> {
        let config = ClassifierConfig::from_env(self.api_key.as_deref());
        let client = HuggingFaceClient::new(&config)?;
        info!(model = %config.model, "Sentiment classifier ready");
        Ok(Arc::new(client))
    }
}

/// A token that is cancelled on Ctrl-C. Work stops at the next chunk or batch boundary.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current chunk");
            child.cancel();
        }
    });
    token
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
