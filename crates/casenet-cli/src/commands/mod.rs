//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PipelineConfig;
use casenet_graph::GraphClient;

pub mod admin;
pub mod build;
pub mod export;

/// Case network pipeline: build, analyze, load and export case/person graphs
#[derive(Parser)]
#[command(name = "casenet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs (without colors) to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the network and load it into Neo4j
    Build(build::BuildArgs),

    /// Build the network and write bulk-import CSV files
    Export(export::ExportArgs),

    /// Delete every node and relationship in Neo4j
    Clear(BackendArgs),

    /// Show Neo4j node and relationship counts
    Status(BackendArgs),
}

/// Neo4j connection flags.
#[derive(Args, Debug, Default, Clone)]
pub struct BackendArgs {
    /// Bolt URI
    #[arg(long, env = "NEO4J_URI")]
    pub neo4j_uri: Option<String>,

    /// Neo4j user
    #[arg(long, env = "NEO4J_USER")]
    pub neo4j_user: Option<String>,

    /// Neo4j password
    #[arg(long, env = "NEO4J_PASSWORD", hide_env_values = true)]
    pub neo4j_password: Option<String>,

    /// Target database
    #[arg(long)]
    pub database: Option<String>,
}

impl BackendArgs {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(uri) = &self.neo4j_uri {
            config.graph.uri = uri.clone();
        }
        if let Some(user) = &self.neo4j_user {
            config.graph.user = user.clone();
        }
        if let Some(password) = &self.neo4j_password {
            config.graph.password = password.clone();
        }
        if let Some(database) = &self.database {
            config.graph.database = database.clone();
        }
    }
}

/// Open the backend connection for this invocation.
pub async fn connect(config: &PipelineConfig) -> Result<GraphClient> {
    GraphClient::connect(&config.graph)
        .await
        .with_context(|| format!("Cannot reach Neo4j at {}", config.graph.uri))
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = PipelineConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Build(args) => build::execute(args, config).await,
            Commands::Export(args) => export::execute(args, config),
            Commands::Clear(args) => admin::clear(args, config).await,
            Commands::Status(args) => admin::status(args, config).await,
        }
    }
}
