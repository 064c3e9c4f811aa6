//! Neo4j implementation of [`GraphStore`].
//!
//! Each upsert is a single `UNWIND $rows` statement, so a chunk is applied in
//! one auto-commit transaction: fully or not at all.
//!
//! - (:Stock)-[:PRICE_ON]->(:TradingDay)
//! - (:Tweet)-[:DISCUSSES]->(:Stock)
//! - (:Tweet)-[:ON_DATE]->(:TradingDay)
//! - (:Tweet)-[:TAGGED_WITH]->(:HashTag)
//! - (:Tweet)-[:MENTIONS_USER]->(:MentionedUser)
//! - (:Tweet)-[:POSTED_BY]->(:User)
//! - (:Tweet)-[:MENTIONS]->(:Topic)
//! - (:Tweet)-[:REFERENCES]->(:NewsEvent)

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType, Query};
use tracing::{debug, warn};

use sentigraph_core::{PostRow, PriceRow, SentimentUpdate};

use crate::schema::initialize_schema;
use crate::store::{CypherQuery, GraphRow, GraphStore, GraphValue};
use crate::GraphClient;

const UPSERT_PRICES: &str = "UNWIND $rows AS row
     MERGE (s:Stock {ticker: row.ticker})
     MERGE (d:TradingDay {date: row.date})
     MERGE (s)-[r:PRICE_ON]->(d)
     SET r.open = row.open,
         r.high = row.high,
         r.low = row.low,
         r.close = row.close,
         r.volume = row.volume,
         r.daily_change = row.daily_change,
         r.volatility = row.volatility
     RETURN count(r) AS written";

// Sentiment from the source is only applied to posts that have none yet, so
// re-ingestion never clobbers an enriched score.
const UPSERT_POSTS: &str = "UNWIND $rows AS row
     MERGE (s:Stock {ticker: row.ticker})
     MERGE (t:Tweet {id: row.id})
     SET t.text = row.text, t.date = row.date
     FOREACH (_ IN CASE WHEN row.sentiment IS NULL OR t.sentiment IS NOT NULL THEN [] ELSE [1] END |
         SET t.sentiment = row.sentiment, t.confidence = row.confidence)
     MERGE (t)-[:DISCUSSES]->(s)
     MERGE (d:TradingDay {date: row.date_only})
     MERGE (t)-[:ON_DATE]->(d)
     FOREACH (tag IN row.hashtags |
         MERGE (h:HashTag {tag: tag})
         MERGE (t)-[:TAGGED_WITH]->(h))
     FOREACH (handle IN row.mentions |
         MERGE (m:MentionedUser {handle: handle})
         MERGE (t)-[:MENTIONS_USER]->(m))
     FOREACH (usr IN CASE WHEN row.user_id IS NULL THEN [] ELSE [row.user_id] END |
         MERGE (u:User {user_id: usr})
         MERGE (t)-[:POSTED_BY]->(u))
     FOREACH (topic IN row.topics |
         MERGE (tp:Topic {name: topic})
         MERGE (t)-[:MENTIONS]->(tp))
     FOREACH (ev IN CASE WHEN row.event_id IS NULL THEN [] ELSE [row.event_id] END |
         MERGE (n:NewsEvent {event_id: ev})
         MERGE (t)-[:REFERENCES]->(n))
     RETURN count(t) AS written";

// MATCH, never MERGE: backfill must not fabricate posts.
const UPDATE_SENTIMENT: &str = "UNWIND $updates AS update
     MATCH (t:Tweet {id: update.id})
     SET t.sentiment = update.sentiment,
         t.confidence = update.confidence
     RETURN count(t) AS updated";

#[async_trait]
impl GraphStore for GraphClient {
    async fn ensure_schema(&self) -> Result<()> {
        initialize_schema(self).await
    }

    async fn upsert_prices(&self, rows: &[PriceRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let params: Vec<BoltType> = rows.iter().map(price_params).collect();
        let query = Query::new(UPSERT_PRICES.to_string()).param("rows", params);

        let written: i64 = self
            .query_scalar(query, "written")
            .await
            .context("Failed to upsert price rows")?
            .unwrap_or(0);
        debug!(rows = rows.len(), written, "Upserted price chunk");
        Ok(written as usize)
    }

    async fn upsert_posts(&self, rows: &[PostRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let params: Vec<BoltType> = rows.iter().map(post_params).collect();
        let query = Query::new(UPSERT_POSTS.to_string()).param("rows", params);

        let written: i64 = self
            .query_scalar(query, "written")
            .await
            .context("Failed to upsert post rows")?
            .unwrap_or(0);
        debug!(rows = rows.len(), written, "Upserted post chunk");
        Ok(written as usize)
    }

    async fn update_sentiment(&self, updates: &[SentimentUpdate]) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }
        let params: Vec<BoltType> = updates
            .iter()
            .map(|u| {
                bolt_map(vec![
                    ("id", u.id.as_str().into()),
                    ("sentiment", u.score.sentiment.into()),
                    ("confidence", u.score.confidence.into()),
                ])
            })
            .collect();
        let query = Query::new(UPDATE_SENTIMENT.to_string()).param("updates", params);

        let updated: i64 = self
            .query_scalar(query, "updated")
            .await
            .context("Failed to write sentiment updates")?
            .unwrap_or(0);
        Ok(updated.max(0) as u64)
    }

    async fn query(&self, query: &CypherQuery) -> Result<Vec<GraphRow>> {
        let mut q = Query::new(query.text.clone());
        for (key, value) in &query.params {
            q = q.param(key, to_bolt(value));
        }

        let rows = GraphClient::query(self, q).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut graph_row = GraphRow::new();
            for column in &query.columns {
                match row.get::<Option<GraphValue>>(column) {
                    Ok(Some(value)) => graph_row.insert(column, value),
                    Ok(None) => {}
                    Err(e) => warn!(column = %column, error = ?e, "Unreadable column in result row"),
                }
            }
            out.push(graph_row);
        }
        Ok(out)
    }
}

fn price_params(row: &PriceRow) -> BoltType {
    bolt_map(vec![
        ("ticker", row.ticker.as_str().into()),
        ("date", row.date_key().into()),
        ("open", row.open.into()),
        ("high", row.high.into()),
        ("low", row.low.into()),
        ("close", row.close.into()),
        ("volume", row.volume.into()),
        ("daily_change", row.daily_change.into()),
        ("volatility", row.volatility.into()),
    ])
}

fn post_params(row: &PostRow) -> BoltType {
    bolt_map(vec![
        ("id", row.id.as_str().into()),
        ("ticker", row.ticker.as_str().into()),
        ("text", row.text.as_str().into()),
        ("date", row.timestamp_iso().into()),
        ("date_only", row.date_key().into()),
        ("hashtags", row.hashtags.clone().into()),
        ("mentions", row.mentions.clone().into()),
        ("topics", row.topics.clone().into()),
        ("sentiment", row.sentiment.map(|s| s.sentiment).into()),
        ("confidence", row.sentiment.map(|s| s.confidence).into()),
        ("user_id", row.user_id.clone().into()),
        ("event_id", row.event_id.clone().into()),
    ])
}

fn bolt_map(entries: Vec<(&str, GraphValue)>) -> BoltType {
    BoltType::Map(BoltMap::from_iter(
        entries
            .into_iter()
            .map(|(key, value)| (BoltString::from(key), to_bolt(&value))),
    ))
}

/// Convert a boundary value into its bolt representation.
pub fn to_bolt(value: &GraphValue) -> BoltType {
    match value {
        GraphValue::Null => BoltType::Null(BoltNull),
        GraphValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        GraphValue::Int(i) => BoltType::Integer(BoltInteger::new(*i)),
        GraphValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        GraphValue::String(s) => BoltType::String(BoltString::from(s.as_str())),
        GraphValue::List(items) => {
            BoltType::List(BoltList::from(items.iter().map(to_bolt).collect::<Vec<_>>()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use sentigraph_core::normalize::normalize_post;

    fn entry<'a>(params: &'a BoltType, key: &str) -> &'a BoltType {
        match params {
            BoltType::Map(map) => map.value.get(&BoltString::from(key)).unwrap(),
            other => panic!("expected a map, got {other:?}"),
        }
    }

    fn float(value: &BoltType) -> f64 {
        match value {
            BoltType::Float(f) => f.value,
            other => panic!("expected a float, got {other:?}"),
        }
    }

    #[test]
    fn test_sentiment_update_only_matches() {
        assert!(UPDATE_SENTIMENT.contains("MATCH (t:Tweet"));
        assert!(!UPDATE_SENTIMENT.contains("MERGE"));
    }

    #[test]
    fn test_post_params_null_optionals() {
        let raw: HashMap<&str, &str> = [
            ("Date", "2022-09-29 23:41:16+00:00"),
            ("Stock Name", "X"),
            ("Tweet", "Great $X #bull"),
        ]
        .into_iter()
        .collect();
        let params = post_params(&normalize_post(&raw).unwrap());

        for key in ["user_id", "event_id", "sentiment", "confidence"] {
            assert!(matches!(entry(&params, key), BoltType::Null(_)), "{key} should be null");
        }
        assert_eq!(entry(&params, "date"), &BoltType::String(BoltString::from("2022-09-29T23:41:16")));
        assert_eq!(entry(&params, "date_only"), &BoltType::String(BoltString::from("2022-09-29")));
        match entry(&params, "hashtags") {
            BoltType::List(list) => assert_eq!(list.value, vec![BoltType::String(BoltString::from("bull"))]),
            other => panic!("expected a list, got {other:?}"),
        }
    }

    #[test]
    fn test_price_params_carry_derived_fields() {
        let date = NaiveDate::from_ymd_opt(2021, 9, 30).unwrap();
        let params = price_params(&PriceRow::new("X", date, 10.0, 12.0, 8.0, 11.0, 200));

        assert!((float(entry(&params, "daily_change")) - 0.1).abs() < 1e-12);
        assert!((float(entry(&params, "volatility")) - 0.4).abs() < 1e-12);
        assert!(matches!(entry(&params, "volume"), BoltType::Integer(i) if i.value == 200));
        assert_eq!(entry(&params, "date"), &BoltType::String(BoltString::from("2021-09-30")));
    }

    #[test]
    fn test_to_bolt_lists() {
        let value = GraphValue::List(vec![GraphValue::from("a"), GraphValue::Int(1), GraphValue::Null]);
        match to_bolt(&value) {
            BoltType::List(list) => {
                assert_eq!(list.value.len(), 3);
                assert_eq!(list.value[0], BoltType::String(BoltString::from("a")));
                assert!(matches!(list.value[1], BoltType::Integer(ref i) if i.value == 1));
                assert!(matches!(list.value[2], BoltType::Null(_)));
            }
            other => panic!("expected a list, got {other:?}"),
        }
        assert!(matches!(to_bolt(&GraphValue::Bool(true)), BoltType::Boolean(ref b) if b.value));
    }
}
