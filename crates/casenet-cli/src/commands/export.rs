//! `casenet export`: write `neo4j-admin` bulk-import files.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use casenet_core::export::{export_graph, ExportOptions};

use super::build::{assemble, centrality, save_snapshot, SourceArgs};
use crate::config::PipelineConfig;
use crate::output::StageTimer;

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Export only the entity network (ignores --file and --db)
    #[arg(long, requires = "entity_nodes")]
    pub entities_only: bool,

    /// Skip centrality computation
    #[arg(long)]
    pub skip_metrics: bool,

    /// Directory for nodes.csv / relationships.csv (temporary directory if omitted)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Field delimiter
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Identifier type passed to the import tool
    #[arg(long)]
    pub id_type: Option<String>,

    /// Database named in the import command
    #[arg(long)]
    pub database: Option<String>,
}

pub fn execute(args: ExportArgs, mut config: PipelineConfig) -> Result<()> {
    let mut source = args.source.clone();
    if args.entities_only {
        if source.file.is_some() || source.db.is_some() {
            println!("  {} --entities-only ignores --file and --db", "!".yellow());
        }
        source.file = None;
        source.db = None;
    }
    source.apply(&mut config);
    config.skip_centrality |= args.skip_metrics;
    if let Some(dir) = args.output_dir {
        config.output_dir = Some(dir);
    }
    if let Some(delimiter) = args.delimiter {
        config.import_delimiter = delimiter;
    }
    if let Some(id_type) = args.id_type {
        config.import_id_type = id_type;
    }
    if let Some(database) = args.database {
        config.graph.database = database;
    }
    let delimiter = config.delimiter_byte()?;
    if config.import_id_type.trim().is_empty() {
        bail!("--id-type cannot be empty");
    }

    println!("{}", "Exporting case network".bold());
    let mut timer = StageTimer::new();
    let mut graph = assemble(&source, &config, &mut timer)?;

    if !config.skip_centrality && centrality(&mut graph, &config, &mut timer) {
        save_snapshot(&graph, &config, &mut timer)?;
    }

    let options = ExportOptions {
        output_dir: config.output_dir.clone(),
        delimiter,
        id_type: config.import_id_type.clone(),
        database: config.graph.database.clone(),
    };
    let report = timer.run("export", || Ok(export_graph(&graph, &options)?))?;

    println!(
        "  {} nodes -> {}",
        report.nodes_written.to_string().bold(),
        report.nodes_path.display()
    );
    println!(
        "  {} relationships -> {}",
        report.relationships_written.to_string().bold(),
        report.relationships_path.display()
    );
    timer.print_summary();

    println!("\n{}", "Import with (database must be stopped):".bold());
    println!("  {}", report.import_command.to_string().cyan());
    Ok(())
}
