//! Backend maintenance: `casenet clear` and `casenet status`.

use anyhow::Result;
use colored::Colorize;

use casenet_graph::clear as clear_graph;

use super::{connect, BackendArgs};
use crate::config::PipelineConfig;
use crate::output::{self, StageTimer};

pub async fn clear(args: BackendArgs, mut config: PipelineConfig) -> Result<()> {
    args.apply(&mut config);
    println!("{} {}", "Clearing".bold(), config.graph.uri);

    let mut timer = StageTimer::new();
    let client = timer.run_async("connect", connect(&config)).await?;
    let deleted = timer.run_async("clear", clear_graph(&client)).await?;
    println!("  {} {} nodes deleted", "✓".green(), deleted);

    let counts = timer.run_async("count", client.get_counts()).await?;
    output::print_counts(&counts);
    timer.print_summary();
    Ok(())
}

pub async fn status(args: BackendArgs, mut config: PipelineConfig) -> Result<()> {
    args.apply(&mut config);

    let mut timer = StageTimer::new();
    let client = timer.run_async("connect", connect(&config)).await?;
    let counts = timer.run_async("count", client.get_counts()).await?;

    println!("\n{}", "Neo4j".bold());
    println!("{}", "─".repeat(40));
    println!("  URI:           {}", config.graph.uri);
    println!("  Database:      {}", client.database());
    output::print_counts(&counts);
    timer.print_summary();
    Ok(())
}
