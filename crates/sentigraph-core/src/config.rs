//! Environment-driven configuration shared by all crates.

use std::path::PathBuf;

use tracing::debug;

/// Default location of the daily price CSV.
pub const DEFAULT_PRICES_CSV: &str = "data/Stock Tweets Sentiment Analysis/stock_yfinance_data.csv";

/// Default location of the social post CSV.
pub const DEFAULT_POSTS_CSV: &str = "data/Stock Tweets Sentiment Analysis/stock_tweets.csv";

/// Load a `.env` file from the working directory, if there is one.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => debug!(error = %e, "Ignoring unreadable environment file"),
    }
}

/// Read a non-empty environment variable.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read an environment variable, falling back to `default`.
pub fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Locations of the two tabular sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub prices: PathBuf,
    pub posts: PathBuf,
}

impl SourcePaths {
    pub fn new(prices: impl Into<PathBuf>, posts: impl Into<PathBuf>) -> Self {
        Self { prices: prices.into(), posts: posts.into() }
    }
}
