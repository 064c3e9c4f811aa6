//! Terminal output formatting.

use colored::{ColoredString, Colorize};

use sentigraph_graph::{GraphCounts, GraphRow, GraphValue};
use sentigraph_pipeline::quality::QualityChecks;
use sentigraph_pipeline::{EnrichmentReport, IngestSummary, PipelineSummary, QualityReport};

/// Print node and relationship counts.
pub fn print_counts(counts: &GraphCounts) {
    println!("{}", "Graph Status".bold());
    println!("{}", "─".repeat(40));
    println!("  Nodes:             {}", counts.nodes.to_string().cyan());
    println!("  Relationships:     {}", counts.relationships.to_string().cyan());
    println!("  Posts:             {}", counts.posts.to_string().cyan());
    println!("  Missing sentiment: {}", attention(counts.posts_missing_sentiment));
    println!("{}", "─".repeat(40));
}

/// Print query rows as a table, one column per returned field.
pub fn print_rows(rows: &[GraphRow], columns: &[&str]) {
    if rows.is_empty() {
        println!("{}", "No results.".dimmed());
        return;
    }

    let header: Vec<String> = columns.iter().map(|c| format!("{c:<24}")).collect();
    println!("{}", header.join(" ").bold());
    println!("{}", "─".repeat(25 * columns.len()));

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| format!("{:<24}", truncate(&display_value(row.get(c)), 24)))
            .collect();
        println!("{}", cells.join(" "));
    }

    println!();
    println!("{} row(s)", rows.len());
}

pub fn print_ingest_summary(summary: &IngestSummary) {
    let title = format!("{} ingestion", capitalize(&summary.kind.to_string()));
    println!("{} {}", title.bold(), summary.source.dimmed());
    println!("  Rows written:  {}", summary.rows_written.to_string().green());
    println!("  Rows scanned:  {}", summary.rows_scanned);
    println!("  Skipped:       {}", attention(summary.rows_skipped));
    println!(
        "  Chunks:        {} ({} failed, {} rows)",
        summary.chunks,
        attention(summary.failed_chunks),
        summary.rows_failed
    );
    if summary.malformed_lines > 0 {
        println!("  Malformed:     {}", summary.malformed_lines.to_string().yellow());
    }
    if summary.cancelled {
        println!("  {}", "Cancelled between chunks".yellow());
    }
}

pub fn print_enrichment_report(report: &EnrichmentReport) {
    if !report.is_success() {
        println!(
            "{} {}",
            "Sentiment enrichment failed:".red().bold(),
            report.message.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    println!("{}", "Sentiment enrichment".bold());
    if let Some(message) = &report.message {
        println!("  {}", message.dimmed());
    }
    println!("  Fetched:   {}", report.fetched);
    println!("  Processed: {}", report.processed.to_string().green());
    println!("  Updated:   {}", report.updated.to_string().green());
    println!("  Errors:    {}", attention(report.errors));
    println!("  Batches:   {} ({} fell back to single texts)", report.batches, report.fallback_batches);
    if report.cancelled {
        println!("  {}", "Cancelled before all batches ran".yellow());
    }
}

pub fn print_pipeline_summary(summary: &PipelineSummary) {
    println!(
        "{} {} {}",
        "Pipeline".bold(),
        summary.ticker.cyan().bold(),
        format!("({} to {})", summary.window.start_key(), summary.window.end_key()).dimmed()
    );
    println!("{}", "─".repeat(50));
    print_ingest_summary(&summary.prices);
    println!();
    print_ingest_summary(&summary.posts);
    println!();
    print_enrichment_report(&summary.sentiment);
    println!("{}", "─".repeat(50));
    println!(
        "{} {} prices synced, {} posts imported",
        "Done:".green().bold(),
        summary.prices_synced(),
        summary.posts_imported()
    );
}

pub fn print_quality_report(report: &QualityReport) {
    let title = format!("{} CSV", capitalize(&report.kind.to_string()));
    println!("{} {}", title.bold(), report.source.dimmed());
    println!("  Rows: {}", report.rows);

    if !report.is_ok() {
        println!("  {} {}", "Missing columns:".red(), report.missing_columns.join(", "));
        return;
    }

    match &report.checks {
        Some(QualityChecks::Prices(c)) => {
            println!("  Invalid dates:  {}", attention(c.invalid_dates));
            println!("  Bad close:      {}", attention(c.bad_close));
            println!("  Bad volume:     {}", attention(c.bad_volume));
            println!("  Duplicate keys: {}", attention(c.duplicate_keys));
        }
        Some(QualityChecks::Posts(c)) => {
            println!("  Invalid dates:          {}", attention(c.invalid_dates));
            println!("  Null text:              {}", attention(c.null_text));
            println!("  Null ticker:            {}", attention(c.null_ticker));
            println!("  Duplicate text per day: {}", attention(c.duplicate_text_per_day));
        }
        None => {}
    }
    if report.malformed_lines > 0 {
        println!("  Malformed lines: {}", report.malformed_lines.to_string().yellow());
    }
}

/// Zero in green, anything else in yellow.
fn attention(n: usize) -> ColoredString {
    if n == 0 {
        n.to_string().green()
    } else {
        n.to_string().yellow()
    }
}

fn display_value(value: Option<&GraphValue>) -> String {
    match value {
        None | Some(GraphValue::Null) => "null".to_string(),
        Some(GraphValue::Bool(b)) => b.to_string(),
        Some(GraphValue::Int(i)) => i.to_string(),
        Some(GraphValue::Float(f)) => format!("{f:.4}"),
        Some(GraphValue::String(s)) => s.clone(),
        Some(GraphValue::List(items)) => {
            let items: Vec<String> = items.iter().map(|v| display_value(Some(v))).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
