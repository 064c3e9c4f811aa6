//! The graph store boundary used by ingestion and enrichment.
//!
//! Everything that crosses it is a [`GraphValue`]: strings, 64-bit floats,
//! 64-bit integers, booleans and homogeneous lists of those. No nested records.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sentigraph_core::{PostRow, PriceRow, SentimentUpdate};

/// A scalar or list value exchanged with the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<GraphValue>),
}

impl GraphValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for GraphValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<f64> for GraphValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for GraphValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for GraphValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<String>> for GraphValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v.into_iter().map(Self::String).collect())
    }
}

impl<T: Into<GraphValue>> From<Option<T>> for GraphValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// A parameterized Cypher read together with the columns to project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CypherQuery {
    pub text: String,
    pub params: BTreeMap<String, GraphValue>,
    pub columns: Vec<String>,
}

impl CypherQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
            columns: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<GraphValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// One result row keyed by column name. Null columns are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphRow(BTreeMap<String, GraphValue>);

impl GraphRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<GraphValue>) -> Self {
        self.insert(column, value.into());
        self
    }

    pub fn insert(&mut self, column: &str, value: GraphValue) {
        if !value.is_null() {
            self.0.insert(column.to_string(), value);
        }
    }

    pub fn get(&self, column: &str) -> Option<&GraphValue> {
        self.0.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(GraphValue::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(GraphValue::as_i64)
    }
}

/// Idempotent writer and scoped reader over the property graph.
///
/// Every call may fail independently; callers attribute a failure to the
/// batch they passed in and carry on.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create uniqueness constraints. Safe to repeat.
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    /// MERGE stocks, trading days and `PRICE_ON` edges; edge numbers are overwritten.
    async fn upsert_prices(&self, rows: &[PriceRow]) -> Result<usize>;

    /// MERGE posts with their stock, day and feature edges in one transaction.
    async fn upsert_posts(&self, rows: &[PostRow]) -> Result<usize>;

    /// Set sentiment on existing posts only. Returns the number of posts matched.
    async fn update_sentiment(&self, updates: &[SentimentUpdate]) -> Result<u64>;

    /// Generic read.
    async fn query(&self, query: &CypherQuery) -> Result<Vec<GraphRow>>;
}
