//! # Sentigraph Pipeline
//!
//! Moves CSV sources into the graph and scores posts with the classifier.
//!
//! - [`source`]: chunked, filtered CSV reading
//! - [`ingest`]: chunk-by-chunk upserts of prices and posts
//! - [`enrich`]: batched sentiment enrichment with per-item fallback
//! - [`pipeline`]: the three phases for one ticker and window
//! - [`quality`]: checks over the raw sources

pub mod enrich;
pub mod ingest;
pub mod pipeline;
pub mod quality;
pub mod source;

#[cfg(test)]
mod testing;

pub use enrich::{EnrichmentReport, EnrichmentRequest, Pacing, RunStatus, SentimentEnricher};
pub use ingest::{import_posts, sync_prices, IngestRequest, IngestSummary, SourceKind};
pub use pipeline::{Pipeline, PipelineRequest, PipelineSummary};
pub use quality::{check_posts, check_prices, QualityReport};
pub use source::{CsvSource, RowFilter};
