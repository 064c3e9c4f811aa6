//! Neo4j schema initialization (constraints and indexes).

use anyhow::Result;
use neo4rs::Query;
use tracing::info;

use crate::GraphClient;

/// Cypher statements for schema initialization.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // Uniqueness constraints, one per natural or derived key
    "CREATE CONSTRAINT tweet_id IF NOT EXISTS FOR (t:Tweet) REQUIRE t.id IS UNIQUE",
    "CREATE CONSTRAINT stock_ticker IF NOT EXISTS FOR (s:Stock) REQUIRE s.ticker IS UNIQUE",
    "CREATE CONSTRAINT trading_day_date IF NOT EXISTS FOR (d:TradingDay) REQUIRE d.date IS UNIQUE",
    "CREATE CONSTRAINT hashtag_tag IF NOT EXISTS FOR (h:HashTag) REQUIRE h.tag IS UNIQUE",
    "CREATE CONSTRAINT mentioned_handle IF NOT EXISTS FOR (m:MentionedUser) REQUIRE m.handle IS UNIQUE",
    "CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.user_id IS UNIQUE",
    "CREATE CONSTRAINT topic_name IF NOT EXISTS FOR (tp:Topic) REQUIRE tp.name IS UNIQUE",
    "CREATE CONSTRAINT news_event_id IF NOT EXISTS FOR (n:NewsEvent) REQUIRE n.event_id IS UNIQUE",
    // Range index for windowed sentiment backfill
    "CREATE INDEX tweet_date IF NOT EXISTS FOR (t:Tweet) ON (t.date)",
];

/// Initialize Neo4j schema with constraints and indexes.
///
/// Safe to run multiple times - uses IF NOT EXISTS clauses.
pub async fn initialize_schema(client: &GraphClient) -> Result<()> {
    info!("Initializing Neo4j schema...");

    for statement in SCHEMA_STATEMENTS {
        client.execute(Query::new(statement.to_string())).await?;
    }

    info!("Neo4j schema initialized ({} statements)", SCHEMA_STATEMENTS.len());
    Ok(())
}
