//! Sentiment enrichment: fetch unscored posts, classify them in batches and
//! write the scores back.
//!
//! A batch that the classifier cannot answer (error, or a result list that
//! does not line up with the inputs) is retried once, item by item. Every
//! fetched post ends up in exactly one of `processed` or `errors`, unless the
//! run is cancelled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sentigraph_classifier::SentimentClassifier;
use sentigraph_core::window::given;
use sentigraph_core::{PostId, SentimentUpdate};
use sentigraph_graph::{CypherQuery, GraphRow, GraphStore};

/// Upper bound (and default) for posts per classifier call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Clamp a requested batch size to `1..=MAX_BATCH_SIZE`.
pub fn clamp_batch_size(requested: Option<usize>) -> usize {
    requested.unwrap_or(MAX_BATCH_SIZE).clamp(1, MAX_BATCH_SIZE)
}

/// Which posts to score. Every filter is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub ticker: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub overwrite: bool,
    pub batch_size: Option<usize>,
}

/// The filters a run actually used, echoed back in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentFilters {
    pub ticker: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
    pub overwrite: bool,
    pub batch_size: usize,
}

impl EnrichmentFilters {
    fn from_request(request: &EnrichmentRequest) -> Self {
        Self {
            ticker: given(request.ticker.as_deref()).map(str::to_string),
            start_date: given(request.start_date.as_deref()).map(str::to_string),
            end_date: given(request.end_date.as_deref()).map(widen_end_date),
            limit: request.limit.filter(|l| *l > 0),
            overwrite: request.overwrite,
            batch_size: clamp_batch_size(request.batch_size),
        }
    }
}

/// A bare `YYYY-MM-DD` end date covers the whole day.
fn widen_end_date(end: &str) -> String {
    if end.len() == 10 && !end.contains('T') {
        format!("{end}T23:59:59")
    } else {
        end.to_string()
    }
}

/// Build the fetch query for `request`.
pub fn build_fetch_query(request: &EnrichmentRequest) -> CypherQuery {
    query_for(&EnrichmentFilters::from_request(request))
}

fn query_for(filters: &EnrichmentFilters) -> CypherQuery {
    let mut text = match filters.ticker {
        Some(_) => String::from("MATCH (t:Tweet)-[:DISCUSSES]->(s:Stock {ticker: $stock})"),
        None => String::from("MATCH (t:Tweet)"),
    };
    let mut conditions = vec!["(t.sentiment IS NULL OR $overwrite = true)"];
    let mut query = CypherQuery::new("").param("overwrite", filters.overwrite);

    if let Some(ticker) = &filters.ticker {
        query = query.param("stock", ticker.as_str());
    }
    if let Some(start) = &filters.start_date {
        conditions.push("t.date >= $start_date");
        query = query.param("start_date", start.as_str());
    }
    if let Some(end) = &filters.end_date {
        conditions.push("t.date <= $end_date");
        query = query.param("end_date", end.as_str());
    }

    text.push_str("\nWHERE ");
    text.push_str(&conditions.join(" AND "));
    text.push_str("\nRETURN t.id AS id, t.text AS text\nORDER BY t.date, t.id");

    if let Some(limit) = filters.limit {
        text.push_str("\nLIMIT $limit");
        query = query.param("limit", limit);
    }

    query.text = text;
    query.returning(&["id", "text"])
}

/// Advisory delays that keep the classifier under its rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub between_batches: Duration,
    pub after_fallback: Duration,
    pub between_items: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_batches: Duration::from_millis(10),
            after_fallback: Duration::from_millis(100),
            between_items: Duration::from_millis(100),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            between_batches: Duration::ZERO,
            after_fallback: Duration::ZERO,
            between_items: Duration::ZERO,
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Counters and echo of one enrichment run.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentReport {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub fetched: usize,
    pub processed: usize,
    pub updated: usize,
    pub errors: usize,
    pub batches: usize,
    pub fallback_batches: usize,
    pub cancelled: bool,
    pub filters: EnrichmentFilters,
    pub query: String,
}

impl EnrichmentReport {
    fn new(filters: EnrichmentFilters, query: &CypherQuery) -> Self {
        Self {
            status: RunStatus::Success,
            message: None,
            fetched: 0,
            processed: 0,
            updated: 0,
            errors: 0,
            batches: 0,
            fallback_batches: 0,
            cancelled: false,
            filters,
            query: query.text.clone(),
        }
    }

    fn failed(mut self, message: String) -> Self {
        self.status = RunStatus::Error;
        self.message = Some(message);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

impl fmt::Display for EnrichmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            if !self.is_success() {
                return write!(f, "Sentiment enrichment failed: {message}");
            }
        }
        write!(
            f,
            "Sentiment enrichment: {} fetched, {} processed, {} updated, {} errors",
            self.fetched, self.processed, self.updated, self.errors
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

struct Pending {
    id: PostId,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Skipped,
    Batched,
    Fallback,
}

/// Runs enrichment against a graph store with a remote classifier.
#[derive(Clone)]
pub struct SentimentEnricher {
    store: Arc<dyn GraphStore>,
    classifier: Arc<dyn SentimentClassifier>,
    pacing: Pacing,
}

impl SentimentEnricher {
    pub fn new(store: Arc<dyn GraphStore>, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self {
            store,
            classifier,
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Score every post selected by `request`. Never fails: a fetch error is
    /// reported with [`RunStatus::Error`].
    pub async fn run(&self, request: &EnrichmentRequest, cancel: &CancellationToken) -> EnrichmentReport {
        let filters = EnrichmentFilters::from_request(request);
        let batch_size = filters.batch_size;
        let query = query_for(&filters);
        let mut report = EnrichmentReport::new(filters, &query);

        if cancel.is_cancelled() {
            info!("Enrichment cancelled before fetching posts");
            report.cancelled = true;
            return report;
        }

        let rows = match self.store.query(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Failed to fetch posts for enrichment");
                return report.failed(format!("Error fetching posts: {e:#}"));
            }
        };

        report.fetched = rows.len();
        if rows.is_empty() {
            report.message = Some("No posts found requiring analysis".to_string());
            info!("{report}");
            return report;
        }
        info!(fetched = report.fetched, batch_size, "Enriching posts");

        let posts: Vec<Pending> = rows
            .iter()
            .filter_map(|row| match pending(row) {
                Some(post) => Some(post),
                None => {
                    report.errors += 1;
                    None
                }
            })
            .collect();

        let mut delay = None;
        for (index, batch) in posts.chunks(batch_size).enumerate() {
            if let Some(d) = delay.take() {
                pause(d).await;
            }
            if cancel.is_cancelled() {
                info!(batch = index, "Enrichment cancelled between batches");
                report.cancelled = true;
                break;
            }

            report.batches += 1;
            debug!(batch = index, size = batch.len(), "Processing batch");
            delay = match self.run_batch(batch, &mut report).await {
                BatchOutcome::Fallback => {
                    report.fallback_batches += 1;
                    Some(self.pacing.after_fallback)
                }
                BatchOutcome::Batched => Some(self.pacing.between_batches),
                BatchOutcome::Skipped => None,
            };
        }

        info!("{report}");
        report
    }

    async fn run_batch(&self, batch: &[Pending], report: &mut EnrichmentReport) -> BatchOutcome {
        let valid: Vec<&Pending> = batch.iter().filter(|p| !p.text.trim().is_empty()).collect();
        report.errors += batch.len() - valid.len();
        if valid.is_empty() {
            return BatchOutcome::Skipped;
        }

        let texts: Vec<String> = valid.iter().map(|p| p.text.clone()).collect();
        match self.classifier.classify_batch(&texts).await {
            Ok(results) if results.len() == valid.len() => {
                let updates: Vec<SentimentUpdate> = valid
                    .iter()
                    .zip(&results)
                    .map(|(post, c)| SentimentUpdate::new(post.id.clone(), c.to_score()))
                    .collect();
                let n = updates.len();
                match self.store.update_sentiment(&updates).await {
                    Ok(matched) => {
                        report.processed += n;
                        report.updated += (matched as usize).min(n);
                    }
                    Err(e) => {
                        warn!(posts = n, error = %e, "Sentiment batch update failed");
                        report.errors += n;
                    }
                }
                BatchOutcome::Batched
            }
            Ok(results) => {
                warn!(
                    expected = valid.len(),
                    received = results.len(),
                    "Misaligned batch classification, falling back to single texts"
                );
                self.fallback(&valid, report).await;
                BatchOutcome::Fallback
            }
            Err(e) => {
                warn!(error = %e, "Batch classification failed, falling back to single texts");
                self.fallback(&valid, report).await;
                BatchOutcome::Fallback
            }
        }
    }

    async fn fallback(&self, posts: &[&Pending], report: &mut EnrichmentReport) {
        for (i, post) in posts.iter().enumerate() {
            if i > 0 {
                pause(self.pacing.between_items).await;
            }

            let classification = match self.classifier.classify(&post.text).await {
                Ok(c) => c,
                Err(e) => {
                    debug!(id = %post.id, error = %e, "Classification failed");
                    report.errors += 1;
                    continue;
                }
            };

            let update = SentimentUpdate::new(post.id.clone(), classification.to_score());
            match self.store.update_sentiment(std::slice::from_ref(&update)).await {
                Ok(matched) => {
                    report.processed += 1;
                    if matched > 0 {
                        report.updated += 1;
                    }
                }
                Err(e) => {
                    debug!(id = %post.id, error = %e, "Sentiment update failed");
                    report.errors += 1;
                }
            }
        }
    }
}

fn pending(row: &GraphRow) -> Option<Pending> {
    let id = row.get_str("id")?;
    Some(Pending {
        id: PostId::from_existing(id),
        text: row.get_str("text").unwrap_or_default().to_string(),
    })
}
