//! End-to-end run for one ticker: prices, posts, then sentiment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use sentigraph_classifier::SentimentClassifier;
use sentigraph_core::{DateWindow, SentigraphResult, SourcePaths};
use sentigraph_graph::GraphStore;

use crate::enrich::{EnrichmentReport, EnrichmentRequest, Pacing, SentimentEnricher};
use crate::ingest::{ensure_schema, ingest_posts, ingest_prices, IngestSummary, SourceKind};
use crate::source::{CsvSource, RowFilter};

pub const DEFAULT_PIPELINE_CHUNK_SIZE: usize = 2000;

/// One pipeline invocation. Blank or placeholder dates fall back to
/// [`DateWindow::pipeline_default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub ticker: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub ticker: String,
    pub window: DateWindow,
    pub prices: IngestSummary,
    pub posts: IngestSummary,
    pub sentiment: EnrichmentReport,
}

impl PipelineSummary {
    pub fn prices_synced(&self) -> usize {
        self.prices.rows_written
    }

    pub fn posts_imported(&self) -> usize {
        self.posts.rows_written
    }
}

pub struct Pipeline {
    store: Arc<dyn GraphStore>,
    enricher: SentimentEnricher,
    sources: SourcePaths,
}

impl Pipeline {
    pub fn new(store: Arc<dyn GraphStore>, classifier: Arc<dyn SentimentClassifier>, sources: SourcePaths) -> Self {
        Self {
            enricher: SentimentEnricher::new(Arc::clone(&store), classifier),
            store,
            sources,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.enricher = self.enricher.with_pacing(pacing);
        self
    }

    /// Run all three phases. A bad window, a missing source file or a missing
    /// required column fails before anything is written; chunk and batch
    /// failures are counted in the summary.
    pub async fn run(&self, request: &PipelineRequest, cancel: &CancellationToken) -> SentigraphResult<PipelineSummary> {
        let window = DateWindow::resolve(
            request.start_date.as_deref(),
            request.end_date.as_deref(),
            DateWindow::pipeline_default(),
        )?;
        let chunk_size = request.chunk_size.unwrap_or(DEFAULT_PIPELINE_CHUNK_SIZE);

        let prices_source = CsvSource::open(&self.sources.prices, chunk_size)?;
        let posts_source = CsvSource::open(&self.sources.posts, chunk_size)?;
        prices_source.require_columns(SourceKind::Prices.required_columns())?;
        posts_source.require_columns(SourceKind::Posts.required_columns())?;
        let filter = RowFilter::new(request.ticker.as_str(), window);

        info!(
            ticker = %request.ticker,
            start = %window.start_key(),
            end = %window.end_key(),
            chunk_size = prices_source.chunk_size(),
            "Starting pipeline"
        );

        ensure_schema(self.store.as_ref()).await;
        let prices = ingest_prices(self.store.as_ref(), &prices_source, &filter, cancel).await?;
        let posts = ingest_posts(self.store.as_ref(), &posts_source, &filter, cancel).await?;

        let enrichment = EnrichmentRequest {
            ticker: Some(request.ticker.clone()),
            start_date: Some(window.start_key()),
            end_date: Some(window.end_key()),
            ..Default::default()
        };
        let sentiment = self.enricher.run(&enrichment, cancel).await;

        let summary = PipelineSummary {
            ticker: request.ticker.clone(),
            window,
            prices,
            posts,
            sentiment,
        };
        info!(
            ticker = %summary.ticker,
            prices = summary.prices_synced(),
            posts = summary.posts_imported(),
            scored = summary.sentiment.processed,
            "Pipeline finished"
        );
        Ok(summary)
    }
}
