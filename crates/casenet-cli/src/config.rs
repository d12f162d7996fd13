//! Pipeline configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file given with
//! `--config`, environment variables for backend credentials, CLI flags.

use anyhow::{Context, Result};
use casenet_core::builder::{DEFAULT_CHUNK_SIZE, DEFAULT_PAGE_SIZE};
use casenet_core::snapshot::DEFAULT_SNAPSHOT;
use casenet_graph::{GraphConfig, DEFAULT_BATCH_SIZE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub store_page_size: usize,
    pub batch_size: usize,
    pub skip_centrality: bool,
    pub build_only: bool,
    pub output_dir: Option<PathBuf>,
    pub import_delimiter: char,
    pub import_id_type: String,
    pub snapshot: PathBuf,
    pub centrality_seed: Option<u64>,
    pub graph: GraphConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            store_page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            skip_centrality: false,
            build_only: false,
            output_dir: None,
            import_delimiter: ',',
            import_id_type: "STRING".to_string(),
            snapshot: PathBuf::from(DEFAULT_SNAPSHOT),
            centrality_seed: None,
            graph: GraphConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overlaid with `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Invalid config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Single-byte delimiter for the exported files.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.import_delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| anyhow::anyhow!("Delimiter must be a single ASCII character, got {:?}", self.import_delimiter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_size, 50_000);
        assert_eq!(config.batch_size, 5_000);
        assert_eq!(config.graph.database, "neo4j");
        assert_eq!(config.delimiter_byte().unwrap(), b',');
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            batch_size = 1000
            import_delimiter = ";"

            [graph]
            uri = "bolt://db:7687"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.chunk_size, 50_000);
        assert_eq!(config.delimiter_byte().unwrap(), b';');
        assert_eq!(config.graph.uri, "bolt://db:7687");
        assert_eq!(config.graph.user, "neo4j");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casenet.toml");
        std::fs::write(&path, "skip_centrality = true\nsnapshot = \"out/red.bin\"\n").unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert!(config.skip_centrality);
        assert_eq!(config.snapshot, PathBuf::from("out/red.bin"));
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let config = PipelineConfig {
            import_delimiter: 'ñ',
            ..PipelineConfig::default()
        };
        assert!(config.delimiter_byte().is_err());
    }
}
