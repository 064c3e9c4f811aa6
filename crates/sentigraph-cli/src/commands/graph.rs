//! Graph schema and inspection commands.

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use sentigraph_graph::{schema, CypherQuery, GraphStore, GraphValue};

use super::{print_json, Neo4jArgs};
use crate::output;

#[derive(Subcommand)]
pub enum GraphCommands {
    /// Create uniqueness constraints and indexes
    Init {
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },

    /// Show node and relationship counts
    Status {
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },

    /// Run a read query
    Query {
        /// Cypher query string
        cypher: String,

        /// Columns to return, comma separated
        #[arg(long, short, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(long = "param", short)]
        params: Vec<String>,

        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
}

pub async fn execute(cmd: GraphCommands, json: bool) -> Result<()> {
    match cmd {
        GraphCommands::Init { neo4j } => cmd_init(&neo4j, json).await,
        GraphCommands::Status { neo4j } => cmd_status(&neo4j, json).await,
        GraphCommands::Query { cypher, columns, params, neo4j } => {
            cmd_query(&neo4j, &cypher, &columns, &params, json).await
        }
    }
}

async fn cmd_init(neo4j: &Neo4jArgs, json: bool) -> Result<()> {
    let client = neo4j.connect().await?;
    schema::initialize_schema(&client).await?;

    if json {
        return print_json(&serde_json::json!({ "status": "ok", "statements": schema::SCHEMA_STATEMENTS.len() }));
    }
    println!("{} {} constraints and indexes", "Schema ready:".green().bold(), schema::SCHEMA_STATEMENTS.len());
    Ok(())
}

async fn cmd_status(neo4j: &Neo4jArgs, json: bool) -> Result<()> {
    let client = neo4j.connect().await?;
    let counts = client.get_counts().await?;

    if json {
        return print_json(&counts);
    }
    output::print_counts(&counts);
    Ok(())
}

async fn cmd_query(neo4j: &Neo4jArgs, cypher: &str, columns: &[String], params: &[String], json: bool) -> Result<()> {
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    let mut query = CypherQuery::new(cypher).returning(&columns);
    for param in params {
        let (key, value) = parse_param(param)?;
        query = query.param(key, value);
    }

    let client = neo4j.connect().await?;
    let rows = GraphStore::query(client.as_ref(), &query).await?;

    if json {
        return print_json(&rows);
    }
    output::print_rows(&rows, &columns);
    Ok(())
}

/// `key=value`, with the value read as an integer, float or boolean when it parses as one.
fn parse_param(raw: &str) -> Result<(&str, GraphValue)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid parameter '{raw}', expected key=value");
    };
    let value = if let Ok(i) = value.parse::<i64>() {
        GraphValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        GraphValue::Float(f)
    } else if let Ok(b) = value.parse::<bool>() {
        GraphValue::Bool(b)
    } else {
        GraphValue::from(value)
    };
    Ok((key.trim(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_types() {
        assert_eq!(parse_param("limit=10").unwrap(), ("limit", GraphValue::Int(10)));
        assert_eq!(parse_param("min=0.5").unwrap(), ("min", GraphValue::Float(0.5)));
        assert_eq!(parse_param("flag=true").unwrap(), ("flag", GraphValue::Bool(true)));
        assert_eq!(parse_param("stock=TSLA").unwrap(), ("stock", GraphValue::from("TSLA")));
        assert!(parse_param("missing").is_err());
    }
}
