//! Sentiment enrichment and single-text analysis.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use sentigraph_classifier::SentimentClassifier;
use sentigraph_pipeline::{EnrichmentRequest, SentimentEnricher};

use super::{cancel_on_ctrl_c, print_json, ClassifierArgs, Neo4jArgs};
use crate::output;

#[derive(Subcommand)]
pub enum SentimentCommands {
    /// Score posts that have no sentiment yet
    Enrich {
        /// Only posts discussing this ticker
        #[arg(long)]
        ticker: Option<String>,

        /// Earliest post timestamp (ISO date or datetime)
        #[arg(long)]
        start: Option<String>,

        /// Latest post timestamp; a bare date covers the whole day
        #[arg(long)]
        end: Option<String>,

        /// Maximum number of posts to fetch
        #[arg(long)]
        limit: Option<i64>,

        /// Re-score posts that already have sentiment
        #[arg(long)]
        overwrite: bool,

        /// Posts per classifier call (1-100)
        #[arg(long, default_value_t = 100)]
        batch_size: usize,

        #[command(flatten)]
        classifier: ClassifierArgs,

        #[command(flatten)]
        neo4j: Neo4jArgs,
    },

    /// Classify a single text without touching the graph
    Analyze {
        text: String,

        #[command(flatten)]
        classifier: ClassifierArgs,
    },
}

pub async fn execute(cmd: SentimentCommands, json: bool) -> Result<()> {
    match cmd {
        SentimentCommands::Enrich {
            ticker,
            start,
            end,
            limit,
            overwrite,
            batch_size,
            classifier,
            neo4j,
        } => {
            let request = EnrichmentRequest {
                ticker,
                start_date: start,
                end_date: end,
                limit,
                overwrite,
                batch_size: Some(batch_size),
            };
            cmd_enrich(&request, &classifier, &neo4j, json).await
        }
        SentimentCommands::Analyze { text, classifier } => cmd_analyze(&text, &classifier, json).await,
    }
}

async fn cmd_enrich(request: &EnrichmentRequest, classifier: &ClassifierArgs, neo4j: &Neo4jArgs, json: bool) -> Result<()> {
    let classifier = classifier.client()?;
    let store = neo4j.connect().await?;
    let cancel = cancel_on_ctrl_c();

    let report = SentimentEnricher::new(store, classifier).run(request, &cancel).await;

    if json {
        print_json(&report)?;
    } else {
        output::print_enrichment_report(&report);
    }
    if !report.is_success() {
        anyhow::bail!(report.message.unwrap_or_else(|| "Sentiment enrichment failed".to_string()));
    }
    Ok(())
}

async fn cmd_analyze(text: &str, classifier: &ClassifierArgs, json: bool) -> Result<()> {
    let client = classifier.client()?;
    let classification = client.classify(text).await?;
    let score = classification.to_score();

    if json {
        return print_json(&serde_json::json!({
            "text": text,
            "label": classification.label.to_string(),
            "score": classification.score,
            "sentiment": score.sentiment,
            "confidence": score.confidence,
        }));
    }

    let label = classification.label.to_string();
    let label = if score.sentiment > 0.0 { label.green() } else { label.red() };
    println!("{} {} ({:.3})", "Label:".bold(), label, classification.score);
    println!("{} {}", "Sentiment:".bold(), score.sentiment);
    Ok(())
}
