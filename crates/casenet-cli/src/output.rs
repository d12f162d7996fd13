//! Terminal output formatting and per-stage timing.

use anyhow::{Context, Result};
use casenet_core::analysis::{ComponentSummary, GraphStats, RankedNode};
use casenet_core::builder::BuildReport;
use casenet_core::entities::MergeReport;
use casenet_core::Graph;
use casenet_graph::{GraphCounts, LoadReport};
use colored::Colorize;
use std::future::Future;
use std::time::{Duration, Instant};

/// Wall-clock time per pipeline stage. A failing stage is named in the error.
#[derive(Default)]
pub struct StageTimer {
    stages: Vec<(&'static str, Duration)>,
}

impl StageTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run<T>(&mut self, name: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        println!("{} {}", "▶".cyan(), name.bold());
        let start = Instant::now();
        let result = f().with_context(|| format!("Stage '{name}' failed"));
        self.stages.push((name, start.elapsed()));
        result
    }

    pub async fn run_async<T, F>(&mut self, name: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        println!("{} {}", "▶".cyan(), name.bold());
        let start = Instant::now();
        let result = fut.await.with_context(|| format!("Stage '{name}' failed"));
        self.stages.push((name, start.elapsed()));
        result
    }

    pub fn print_summary(&self) {
        if self.stages.is_empty() {
            return;
        }
        println!("\n{}", "Timing".bold());
        println!("{}", "─".repeat(40));
        let mut total = Duration::ZERO;
        for (name, elapsed) in &self.stages {
            println!("  {:<26} {:>9.2}s", name, elapsed.as_secs_f64());
            total += *elapsed;
        }
        println!("  {:<26} {:>9.2}s", "total", total.as_secs_f64());
    }
}

pub fn print_graph_summary(graph: &Graph) {
    use casenet_core::NodeKind;
    println!(
        "  {} nodes ({} cases, {} persons, {} entities), {} edges",
        graph.node_count().to_string().bold(),
        graph.count_kind(NodeKind::Case),
        graph.count_kind(NodeKind::Person),
        graph.count_kind(NodeKind::Entity),
        graph.edge_count().to_string().bold()
    );
}

pub fn print_build_report(report: &BuildReport) {
    println!(
        "  rows read: {}, new cases: {}, new persons: {}, new edges: {}",
        report.rows_read, report.case_nodes_created, report.person_nodes_created, report.edges_created
    );
    if report.skipped_rows > 0 {
        println!("  {} {} rows skipped", "!".yellow(), report.skipped_rows);
    }
    if report.placeholder_persons > 0 {
        println!(
            "  {} {} linked persons missing from the registry (placeholders)",
            "!".yellow(),
            report.placeholder_persons
        );
    }
}

pub fn print_merge_report(report: &MergeReport) {
    println!(
        "  entities: {} created, {} updated; links: {} created, {} updated; {} placeholders",
        report.nodes_created,
        report.nodes_updated,
        report.edges_created,
        report.edges_updated,
        report.placeholders_created
    );
    let skipped = report.skipped_nodes + report.skipped_edges;
    if skipped > 0 {
        println!(
            "  {} {} malformed records skipped ({} nodes, {} edges)",
            "!".yellow(),
            skipped,
            report.skipped_nodes,
            report.skipped_edges
        );
    }
}

pub fn print_components(summary: &ComponentSummary) {
    println!(
        "  {} components, largest has {} nodes",
        summary.count.to_string().bold(),
        summary.largest()
    );
}

fn print_ranking(title: &str, ranked: &[RankedNode]) {
    println!("  {}", title.bold());
    for (i, node) in ranked.iter().enumerate() {
        println!("    {:>2}. {:<30} {:.6}", i + 1, node.id, node.score);
    }
}

pub fn print_centrality(stats: &GraphStats) {
    println!(
        "  analyzed {} nodes, {} edges, {} components, density {:.6}",
        stats.node_count, stats.edge_count, stats.component_count, stats.density
    );
    match stats.diameter {
        Some(d) => println!("  diameter: {}", d),
        None => println!("  diameter: {}", "n/a (not connected)".dimmed()),
    }
    print_ranking("Top degree", &stats.top_degree);
    print_ranking("Top betweenness", &stats.top_betweenness);
    print_ranking("Top closeness", &stats.top_closeness);
}

pub fn print_load_report(report: &LoadReport) {
    println!("  write path: {:?}", report.capability);
    println!(
        "  nodes: {} ({} cases, {} persons)",
        report.nodes_written().to_string().bold(),
        report.case_nodes,
        report.person_nodes
    );
    for (label, count) in &report.entity_nodes {
        println!("    :{} {}", label.cyan(), count);
    }
    println!("  relationships: {}", report.relationships.to_string().bold());
}

pub fn print_counts(counts: &GraphCounts) {
    println!("  Nodes:         {}", counts.nodes.to_string().bold());
    println!("  Relationships: {}", counts.relationships.to_string().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_names_failing_stage() {
        let mut timer = StageTimer::new();
        timer.run("read", || Ok(())).unwrap();
        let err = timer
            .run("merge", || -> Result<()> { anyhow::bail!("bad json") })
            .unwrap_err();

        assert_eq!(err.to_string(), "Stage 'merge' failed");
        assert!(format!("{err:#}").contains("bad json"));
        assert_eq!(timer.stages.len(), 2);
    }

    #[tokio::test]
    async fn test_async_stage_is_timed() {
        let mut timer = StageTimer::new();
        let value = timer.run_async("connect", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(timer.stages[0].0, "connect");
    }
}
