//! Data quality report over both CSV sources.

use anyhow::Result;
use clap::Args;

use sentigraph_pipeline::{check_posts, check_prices};

use super::{print_json, SourceArgs};
use crate::output;

#[derive(Args)]
pub struct QualityArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
}

pub fn execute(args: QualityArgs, json: bool) -> Result<()> {
    let prices = check_prices(&args.sources.prices)?;
    let posts = check_posts(&args.sources.posts)?;

    if json {
        return print_json(&serde_json::json!({ "prices": prices, "posts": posts }));
    }
    output::print_quality_report(&prices);
    println!();
    output::print_quality_report(&posts);
    Ok(())
}
