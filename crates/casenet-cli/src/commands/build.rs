//! `casenet build`: assemble the network and load it into Neo4j.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::warn;

use casenet_core::analysis::{analyze_centrality, annotate_components, CentralityOptions};
use casenet_core::builder::{build_network, BuildOptions, CaseSource};
use casenet_core::entities::entity_network;
use casenet_core::snapshot::{DEFAULT_SNAPSHOT, ENTITY_SNAPSHOT};
use casenet_core::{snapshot, Graph};
use casenet_db::SqliteCaseStore;
use casenet_graph::{update_centrality, Capability, GraphWriter, LoadOptions};

use super::{connect, BackendArgs};
use crate::config::PipelineConfig;
use crate::output::{self, StageTimer};

/// Where the network comes from.
#[derive(Args, Debug, Default, Clone)]
pub struct SourceArgs {
    /// Pipe-delimited case extract
    #[arg(long, conflicts_with = "db")]
    pub file: Option<PathBuf>,

    /// SQLite database with consolidado_spoa / personas_df tables
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// JSON array of entity nodes, merged before the case records
    #[arg(long, requires = "entity_edges")]
    pub entity_nodes: Option<PathBuf>,

    /// JSON array of entity links
    #[arg(long, requires = "entity_nodes")]
    pub entity_edges: Option<PathBuf>,

    /// Rows per chunk when reading the extract
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Snapshot file written after the build (read with --load-only)
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Reuse the snapshot instead of building
    #[arg(long)]
    pub load_only: bool,

    /// Seed for centrality sampling on very large graphs
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SourceArgs {
    /// Entity files given without any case source.
    pub fn entities_only(&self) -> bool {
        self.entity_nodes.is_some() && self.file.is_none() && self.db.is_none()
    }

    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(snapshot) = &self.snapshot {
            config.snapshot = snapshot.clone();
        } else if self.entities_only() && config.snapshot == Path::new(DEFAULT_SNAPSHOT) {
            config.snapshot = PathBuf::from(ENTITY_SNAPSHOT);
        }
        if self.seed.is_some() {
            config.centrality_seed = self.seed;
        }
    }
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// Rows per backend write batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip centrality computation
    #[arg(long)]
    pub skip_metrics: bool,

    /// Build and snapshot only, do not touch Neo4j
    #[arg(long)]
    pub build_only: bool,

    /// Use transactional MERGE batches even if bulk procedures exist
    #[arg(long)]
    pub force_standard: bool,
}

pub async fn execute(args: BuildArgs, mut config: PipelineConfig) -> Result<()> {
    args.source.apply(&mut config);
    args.backend.apply(&mut config);
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.skip_centrality |= args.skip_metrics;
    config.build_only |= args.build_only;

    println!("{}", "Building case network".bold());
    let mut timer = StageTimer::new();
    let mut graph = assemble(&args.source, &config, &mut timer)?;

    if !config.build_only {
        let report = {
            let client = timer.run_async("connect", connect(&config)).await?;
            let options = LoadOptions {
                batch_size: config.batch_size,
                capability: args.force_standard.then_some(Capability::StandardOnly),
            };
            let mut writer = GraphWriter::new(&client, options);
            timer.run_async("load", writer.load(&graph)).await?
        };
        output::print_load_report(&report);

        if !config.skip_centrality && centrality(&mut graph, &config, &mut timer) {
            // Fresh session: the one used for the load may have gone stale.
            let pushed = timer
                .run_async("update centrality", async {
                    let client = connect(&config).await?;
                    update_centrality(&client, &graph, config.batch_size).await
                })
                .await;
            if let Err(e) = pushed {
                warn!(error = %format!("{e:#}"), "Centrality update failed, continuing");
                println!("  {} centrality not written: {:#}", "!".yellow(), e);
            }
            save_snapshot(&graph, &config, &mut timer)?;
        }
    } else if !config.skip_centrality && centrality(&mut graph, &config, &mut timer) {
        save_snapshot(&graph, &config, &mut timer)?;
    }

    timer.print_summary();
    println!("\n{}", "Done.".green().bold());
    Ok(())
}

/// Build (or reload) the graph, annotate components and save the snapshot.
pub fn assemble(source: &SourceArgs, config: &PipelineConfig, timer: &mut StageTimer) -> Result<Graph> {
    if source.load_only {
        let graph = timer.run("load snapshot", || Ok(snapshot::load(&config.snapshot)?))?;
        output::print_graph_summary(&graph);
        return Ok(graph);
    }

    let mut graph = None;
    if let (Some(nodes), Some(edges)) = (&source.entity_nodes, &source.entity_edges) {
        let (merged, report) = timer.run("merge entities", || Ok(entity_network(nodes, edges, None)?))?;
        output::print_merge_report(&report);
        graph = Some(merged);
    }

    let options = BuildOptions {
        chunk_size: config.chunk_size,
        page_size: config.store_page_size,
    };
    if let Some(db) = &source.db {
        let pool = timer.run("open store", || Ok(casenet_db::init_pool(db)?))?;
        let store = SqliteCaseStore::new(pool);
        let (built, report) = timer.run("build from store", || {
            Ok(build_network(CaseSource::Store(&store), graph.take(), options)?)
        })?;
        output::print_build_report(&report);
        graph = Some(built);
    } else if let Some(file) = &source.file {
        let (built, report) = timer.run("build from file", || {
            Ok(build_network(CaseSource::File(file), graph.take(), options)?)
        })?;
        output::print_build_report(&report);
        graph = Some(built);
    }

    let Some(mut graph) = graph else {
        bail!("No source given: use --file, --db, or --entity-nodes with --entity-edges");
    };

    let summary = timer.run("components", || Ok(annotate_components(&mut graph)))?;
    output::print_graph_summary(&graph);
    output::print_components(&summary);
    save_snapshot(&graph, config, timer)?;
    Ok(graph)
}

pub fn save_snapshot(graph: &Graph, config: &PipelineConfig, timer: &mut StageTimer) -> Result<()> {
    timer.run("snapshot", || Ok(snapshot::save(graph, &config.snapshot)?))?;
    println!("  snapshot: {}", config.snapshot.display());
    Ok(())
}

/// Best-effort centrality. Returns whether scores were stamped on the graph.
pub fn centrality(graph: &mut Graph, config: &PipelineConfig, timer: &mut StageTimer) -> bool {
    let options = CentralityOptions {
        seed: config.centrality_seed,
    };
    match timer.run("centrality", || Ok(analyze_centrality(graph, &options)?)) {
        Ok(report) => {
            output::print_centrality(&report.stats);
            true
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Centrality failed, continuing without it");
            println!("  {} centrality skipped: {:#}", "!".yellow(), e);
            false
        }
    }
}
