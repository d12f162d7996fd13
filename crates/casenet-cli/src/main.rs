//! casenet - case/person network pipeline
//!
//! Builds the network from case extracts and entity files, computes
//! component and centrality metrics, then loads it into Neo4j or writes
//! bulk-import files.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

use commands::Cli;

const DEFAULT_FILTER: &str = "casenet=info,casenet_core=info,casenet_db=info,casenet_graph=info";
const VERBOSE_FILTER: &str = "casenet=debug,casenet_core=debug,casenet_db=debug,casenet_graph=debug";

/// Initialize tracing to stdout, plus a plain-text file when `log_file` is set.
///
/// The returned guard flushes the file writer on drop and must outlive `main`'s work.
fn init_tracing(log_file: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }.into());

    let stdout_layer = tracing_subscriber::fmt::layer();

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid log file path {}", path.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref(), cli.verbose)?;

    cli.execute().await
}
