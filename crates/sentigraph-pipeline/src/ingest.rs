//! Source → graph ingestion, one upsert per chunk.
//!
//! Chunks are independent: a failed upsert is attributed to that chunk's rows
//! and the reader moves on. Cancellation is honoured between chunks only, so a
//! chunk is never half-written by us.

use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sentigraph_core::normalize::{columns, normalize_post, normalize_price};
use sentigraph_core::{DateWindow, PostRow, PriceRow, SentigraphResult};
use sentigraph_graph::GraphStore;

use crate::source::{CsvSource, RawRow, RowFilter};

/// Chunk size of the standalone price sync / post import.
pub const DEFAULT_INGEST_CHUNK_SIZE: usize = 1000;

/// Which tabular source a run reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Prices,
    Posts,
}

impl SourceKind {
    /// Columns a source of this kind must have for any row to normalize.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Prices => &[
                columns::DATE,
                columns::TICKER,
                columns::OPEN,
                columns::HIGH,
                columns::LOW,
                columns::CLOSE,
                columns::VOLUME,
            ],
            Self::Posts => &[columns::DATE, columns::TICKER, columns::TEXT],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prices => f.write_str("prices"),
            Self::Posts => f.write_str("posts"),
        }
    }
}

/// Request for a standalone ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    pub ticker: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub chunk_size: Option<usize>,
}

/// Outcome of ingesting one source.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub kind: SourceKind,
    pub source: String,
    /// Records handed to the store in chunks that succeeded.
    pub rows_written: usize,
    /// Raw records read, before filtering.
    pub rows_scanned: usize,
    /// Rows that passed the filter but could not be normalized.
    pub rows_skipped: usize,
    pub rows_failed: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
    pub malformed_lines: usize,
    pub cancelled: bool,
}

impl IngestSummary {
    fn new(kind: SourceKind, source: &Path) -> Self {
        Self {
            kind,
            source: source.display().to_string(),
            rows_written: 0,
            rows_scanned: 0,
            rows_skipped: 0,
            rows_failed: 0,
            chunks: 0,
            failed_chunks: 0,
            malformed_lines: 0,
            cancelled: false,
        }
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ingestion: {} rows written, {} chunks ({} failed, {} rows), {} skipped",
            self.kind, self.rows_written, self.chunks, self.failed_chunks, self.rows_failed, self.rows_skipped
        )
    }
}

enum Records {
    Prices(Vec<PriceRow>),
    Posts(Vec<PostRow>),
}

impl Records {
    fn normalize(kind: SourceKind, rows: &[RawRow]) -> Self {
        match kind {
            SourceKind::Prices => Self::Prices(rows.iter().filter_map(normalize_price).collect()),
            SourceKind::Posts => Self::Posts(rows.iter().filter_map(normalize_post).collect()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Prices(rows) => rows.len(),
            Self::Posts(rows) => rows.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn write(&self, store: &dyn GraphStore) -> Result<usize> {
        match self {
            Self::Prices(rows) => store.upsert_prices(rows).await,
            Self::Posts(rows) => store.upsert_posts(rows).await,
        }
    }
}

/// Ingest filtered price bars from `source`.
pub async fn ingest_prices(
    store: &dyn GraphStore,
    source: &CsvSource,
    filter: &RowFilter,
    cancel: &CancellationToken,
) -> SentigraphResult<IngestSummary> {
    ingest(SourceKind::Prices, store, source, filter, cancel).await
}

/// Ingest filtered posts from `source`.
pub async fn ingest_posts(
    store: &dyn GraphStore,
    source: &CsvSource,
    filter: &RowFilter,
    cancel: &CancellationToken,
) -> SentigraphResult<IngestSummary> {
    ingest(SourceKind::Posts, store, source, filter, cancel).await
}

async fn ingest(
    kind: SourceKind,
    store: &dyn GraphStore,
    source: &CsvSource,
    filter: &RowFilter,
    cancel: &CancellationToken,
) -> SentigraphResult<IngestSummary> {
    source.require_columns(kind.required_columns())?;
    let mut summary = IngestSummary::new(kind, source.path());
    let mut chunks = source.chunks(|row: &RawRow| filter.accepts(row))?;

    info!(%kind, source = %summary.source, chunk_size = source.chunk_size(), "Starting ingestion");

    loop {
        if cancel.is_cancelled() {
            info!(%kind, chunks = summary.chunks, "Ingestion cancelled between chunks");
            summary.cancelled = true;
            break;
        }
        let Some(chunk) = chunks.next() else { break };

        summary.chunks += 1;
        summary.rows_scanned += chunk.scanned;

        let records = Records::normalize(kind, &chunk.rows);
        summary.rows_skipped += chunk.rows.len() - records.len();
        if records.is_empty() {
            continue;
        }

        match records.write(store).await {
            Ok(written) => {
                summary.rows_written += records.len();
                debug!(%kind, chunk = chunk.index, rows = records.len(), written, "Chunk upserted");
            }
            Err(e) => {
                summary.failed_chunks += 1;
                summary.rows_failed += records.len();
                warn!(%kind, chunk = chunk.index, rows = records.len(), error = %e, "Chunk upsert failed");
            }
        }
    }

    summary.malformed_lines = chunks.malformed();
    info!("{summary}");
    Ok(summary)
}

/// Standalone price sync for one ticker. Missing dates fall back to
/// [`DateWindow::ingest_default`].
pub async fn sync_prices(
    store: &dyn GraphStore,
    path: &Path,
    request: &IngestRequest,
    cancel: &CancellationToken,
) -> SentigraphResult<IngestSummary> {
    let (source, filter) = prepare(path, request)?;
    ensure_schema(store).await;
    ingest_prices(store, &source, &filter, cancel).await
}

/// Standalone post import for one ticker. Missing dates fall back to
/// [`DateWindow::ingest_default`].
pub async fn import_posts(
    store: &dyn GraphStore,
    path: &Path,
    request: &IngestRequest,
    cancel: &CancellationToken,
) -> SentigraphResult<IngestSummary> {
    let (source, filter) = prepare(path, request)?;
    ensure_schema(store).await;
    ingest_posts(store, &source, &filter, cancel).await
}

fn prepare(path: &Path, request: &IngestRequest) -> SentigraphResult<(CsvSource, RowFilter)> {
    let window = DateWindow::resolve(
        request.start_date.as_deref(),
        request.end_date.as_deref(),
        DateWindow::ingest_default(),
    )?;
    let source = CsvSource::open(path, request.chunk_size.unwrap_or(DEFAULT_INGEST_CHUNK_SIZE))?;
    Ok((source, RowFilter::new(request.ticker.as_str(), window)))
}

/// Schema setup failures are logged, not fatal: chunk writes report their own errors.
pub(crate) async fn ensure_schema(store: &dyn GraphStore) {
    if let Err(e) = store.ensure_schema().await {
        warn!(error = %e, "Schema initialization failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_csv, MemoryGraph};

    const PRICES: &str = "Date,Open,High,Low,Close,Adj Close,Volume,Stock Name
2021-09-29,10,11,9,10.5,10.5,100,X
2021-09-30,10,12,8,11,11,200,X
2021-10-01,0,5,1,3,3,300,X
2021-09-30,50,51,49,50,50,999,Y
";

    const POSTS: &str = "Date,Tweet,Stock Name,Company Name
2021-09-30 10:00:00+00:00,Great $X #bull @jane,X,X Corp
2021-09-30 11:00:00+00:00,Second post #bull #bull,X,X Corp
not-a-date,Broken row,X,X Corp
2021-09-30 12:00:00+00:00,Other ticker,Y,Y Corp
";

    fn request(start: &str, end: &str) -> IngestRequest {
        IngestRequest {
            ticker: "X".into(),
            start_date: Some(start.into()),
            end_date: Some(end.into()),
            chunk_size: None,
        }
    }

    #[tokio::test]
    async fn test_price_window_scenario() {
        let file = write_csv(PRICES);
        let store = MemoryGraph::new();
        let summary = sync_prices(&store, file.path(), &request("2021-09-30", "2021-10-01"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.rows_scanned, 4);
        assert_eq!(store.price_dates("X"), vec!["2021-09-30", "2021-10-01"]);

        let zero_open = store.price("X", "2021-10-01").unwrap();
        assert_eq!(zero_open.daily_change, 0.0);
        assert_eq!(zero_open.volatility, 0.0);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let file = write_csv(POSTS);
        let store = MemoryGraph::new();
        let req = request("2021-09-30", "2021-09-30");
        let cancel = CancellationToken::new();

        let first = import_posts(&store, file.path(), &req, &cancel).await.unwrap();
        let second = import_posts(&store, file.path(), &req, &cancel).await.unwrap();

        assert_eq!(first.rows_written, 2);
        assert_eq!(second.rows_written, 2);
        assert_eq!(store.post_count(), 2);
    }

    #[tokio::test]
    async fn test_post_features_reach_store() {
        let file = write_csv(POSTS);
        let store = MemoryGraph::new();
        import_posts(&store, file.path(), &request("2021-09-30", "2021-09-30"), &CancellationToken::new())
            .await
            .unwrap();

        let post = store
            .posts()
            .into_iter()
            .find(|p| p.text.starts_with("Great"))
            .unwrap();
        assert_eq!(post.hashtags, vec!["bull"]);
        assert_eq!(post.mentions, vec!["jane"]);
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_later_chunks() {
        let mut data = String::from("Date,Open,High,Low,Close,Adj Close,Volume,Stock Name\n");
        for day in 1..=28 {
            for _ in 0..10 {
                data.push_str(&format!("2022-02-{day:02},1,2,1,1.5,1.5,10,X\n"));
            }
        }
        let file = write_csv(&data);
        let store = MemoryGraph::new();
        store.fail_price_chunk(0);

        let req = IngestRequest { chunk_size: Some(100), ..request("2022-02-01", "2022-02-28") };
        let summary = sync_prices(&store, file.path(), &req, &CancellationToken::new()).await.unwrap();

        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.failed_chunks, 1);
        assert_eq!(summary.rows_failed, 100);
        assert_eq!(summary.rows_written, 180);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_chunk() {
        let file = write_csv(PRICES);
        let store = MemoryGraph::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = sync_prices(&store, file.path(), &request("2021-09-30", "2021-10-01"), &cancel)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.chunks, 0);
        assert!(store.price_dates("X").is_empty());
    }

    #[tokio::test]
    async fn test_missing_column_is_error() {
        let file = write_csv("Date,Stock Name,Company Name\n2021-09-30 10:00:00+00:00,X,X Corp\n");
        let store = MemoryGraph::new();
        let result = import_posts(&store, file.path(), &request("2021-09-30", "2021-09-30"), &CancellationToken::new()).await;

        assert!(matches!(result, Err(sentigraph_core::SentigraphError::MissingColumn { .. })));
        assert_eq!(store.post_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_error() {
        let store = MemoryGraph::new();
        let result = sync_prices(
            &store,
            Path::new("/no/such/prices.csv"),
            &request("2021-09-30", "2021-10-01"),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(sentigraph_core::SentigraphError::SourceNotFound(_))));
    }
}
