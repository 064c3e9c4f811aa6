//! In-memory fakes for the graph store and the classifier.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use sentigraph_classifier::{Classification, SentimentClassifier, SentimentLabel};
use sentigraph_core::normalize::normalize_post;
use sentigraph_core::{PostId, PostRow, PriceRow, SentimentScore, SentimentUpdate};
use sentigraph_graph::{CypherQuery, GraphRow, GraphStore, GraphValue};

pub fn write_csv(data: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(data.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

struct StoredPost {
    row: PostRow,
    score: Option<SentimentScore>,
}

#[derive(Default)]
struct State {
    prices: BTreeMap<(String, String), PriceRow>,
    posts: BTreeMap<String, StoredPost>,
    price_calls: usize,
    failing_price_calls: HashSet<usize>,
    failing_update_ids: HashSet<String>,
    fail_query: bool,
    update_calls: usize,
    queries: Vec<CypherQuery>,
}

/// Graph store that mirrors the MERGE / MATCH semantics of the Cypher writer.
#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_price_chunk(&self, call_index: usize) {
        self.state.lock().unwrap().failing_price_calls.insert(call_index);
    }

    pub fn fail_updates_for(&self, id: &PostId) {
        self.state.lock().unwrap().failing_update_ids.insert(id.to_string());
    }

    pub fn fail_queries(&self) {
        self.state.lock().unwrap().fail_query = true;
    }

    /// Insert a post as ingestion would and return its id.
    pub fn seed_post(&self, ticker: &str, text: &str, raw_timestamp: &str) -> PostId {
        let raw: HashMap<&str, &str> =
            [("Stock Name", ticker), ("Tweet", text), ("Date", raw_timestamp)].into_iter().collect();
        let row = normalize_post(&raw).unwrap();
        let id = row.id.clone();
        self.state
            .lock()
            .unwrap()
            .posts
            .insert(id.to_string(), StoredPost { row, score: None });
        id
    }

    pub fn set_sentiment(&self, id: &PostId, score: SentimentScore) {
        if let Some(post) = self.state.lock().unwrap().posts.get_mut(id.as_str()) {
            post.score = Some(score);
        }
    }

    pub fn sentiment_of(&self, id: &PostId) -> Option<SentimentScore> {
        self.state.lock().unwrap().posts.get(id.as_str()).and_then(|p| p.score)
    }

    pub fn scored_posts(&self) -> usize {
        self.state.lock().unwrap().posts.values().filter(|p| p.score.is_some()).count()
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().unwrap().posts.len()
    }

    pub fn posts(&self) -> Vec<PostRow> {
        self.state.lock().unwrap().posts.values().map(|p| p.row.clone()).collect()
    }

    pub fn price(&self, ticker: &str, date: &str) -> Option<PriceRow> {
        self.state
            .lock()
            .unwrap()
            .prices
            .get(&(ticker.to_string(), date.to_string()))
            .cloned()
    }

    pub fn price_dates(&self, ticker: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .prices
            .keys()
            .filter(|(t, _)| t == ticker)
            .map(|(_, d)| d.clone())
            .collect()
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }

    pub fn last_query(&self) -> Option<CypherQuery> {
        self.state.lock().unwrap().queries.last().cloned()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_prices(&self, rows: &[PriceRow]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let call = state.price_calls;
        state.price_calls += 1;
        if state.failing_price_calls.contains(&call) {
            bail!("store unavailable for price chunk {call}");
        }
        for row in rows {
            state.prices.insert((row.ticker.clone(), row.date_key()), row.clone());
        }
        Ok(rows.len())
    }

    async fn upsert_posts(&self, rows: &[PostRow]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        for row in rows {
            let entry = state
                .posts
                .entry(row.id.to_string())
                .or_insert_with(|| StoredPost { row: row.clone(), score: None });
            if entry.score.is_none() {
                entry.score = row.sentiment;
            }
        }
        Ok(rows.len())
    }

    async fn update_sentiment(&self, updates: &[SentimentUpdate]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.update_calls += 1;
        if updates.iter().any(|u| state.failing_update_ids.contains(u.id.as_str())) {
            bail!("constraint violation while updating sentiment");
        }
        let mut matched = 0;
        for update in updates {
            if let Some(post) = state.posts.get_mut(update.id.as_str()) {
                post.score = Some(update.score);
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn query(&self, query: &CypherQuery) -> Result<Vec<GraphRow>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.clone());
        if state.fail_query {
            return Err(anyhow!("store unavailable"));
        }

        let param = |key: &str| query.params.get(key);
        let overwrite = matches!(param("overwrite"), Some(GraphValue::Bool(true)));
        let stock = param("stock").and_then(GraphValue::as_str);
        let start = param("start_date").and_then(GraphValue::as_str);
        let end = param("end_date").and_then(GraphValue::as_str);
        let limit = param("limit").and_then(GraphValue::as_i64);

        let mut selected: Vec<&StoredPost> = state
            .posts
            .values()
            .filter(|p| p.score.is_none() || overwrite)
            .filter(|p| stock.map_or(true, |s| p.row.ticker == s))
            .filter(|p| start.map_or(true, |s| p.row.timestamp_iso().as_str() >= s))
            .filter(|p| end.map_or(true, |e| p.row.timestamp_iso().as_str() <= e))
            .collect();
        selected.sort_by_key(|p| (p.row.timestamp_iso(), p.row.id.to_string()));
        if let Some(limit) = limit {
            selected.truncate(limit.max(0) as usize);
        }

        Ok(selected
            .into_iter()
            .map(|p| GraphRow::new().with("id", p.row.id.as_str()).with("text", p.row.text.as_str()))
            .collect())
    }
}

/// How the fake answers `classify_batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchBehavior {
    Aligned,
    Fail,
    Misaligned,
}

/// Deterministic classifier: texts containing "good" are confidently
/// positive, "meh" is weakly positive, anything else negative.
pub struct FakeClassifier {
    batch: BatchBehavior,
    failing_texts: HashSet<String>,
    batch_calls: AtomicUsize,
    single_calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(batch: BatchBehavior) -> Self {
        Self {
            batch,
            failing_texts: HashSet::new(),
            batch_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing_texts.insert(text.to_string());
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    fn label(text: &str) -> Classification {
        if text.contains("good") {
            Classification::new(SentimentLabel::Positive, 0.9)
        } else if text.contains("meh") {
            Classification::new(SentimentLabel::Positive, 0.3)
        } else {
            Classification::new(SentimentLabel::Negative, 0.8)
        }
    }
}

#[async_trait]
impl SentimentClassifier for FakeClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_texts.contains(text) {
            bail!("request timed out");
        }
        Ok(Self::label(text))
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        match self.batch {
            BatchBehavior::Aligned => Ok(texts.iter().map(|t| Self::label(t)).collect()),
            BatchBehavior::Fail => bail!("batch endpoint unavailable"),
            BatchBehavior::Misaligned => Ok(texts.iter().skip(1).map(|t| Self::label(t)).collect()),
        }
    }
}
