//! # Sentigraph Graph
//!
//! Neo4j property-graph integration for sentigraph.
//!
//! Provides the connection client, schema constraints, and the idempotent
//! upsert writer behind the [`GraphStore`] boundary.

pub mod client;
pub mod schema;
pub mod store;
pub mod writer;

pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use store::{CypherQuery, GraphRow, GraphStore, GraphValue};
