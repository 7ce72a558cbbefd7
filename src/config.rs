use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregation::{HIGH_VARIABILITY_THRESHOLD, MEDIUM_VARIABILITY_THRESHOLD};
use crate::filter::DEFAULT_TARGET_ACCOUNT;

/// Pipeline settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Account code selecting expense lines (its 2-char prefix also matches)
    pub target_account: String,

    /// Root directory scanned for extracted source files
    pub input_dir: PathBuf,

    /// Operator registry table
    pub registry_path: PathBuf,

    pub consolidated_output: PathBuf,
    pub aggregated_output: PathBuf,

    /// SQLite audit trail; disabled when absent
    pub audit_db: Option<PathBuf>,

    pub log_level: String,

    /// Also write a deflated `.zip` next to each stage CSV
    pub package_outputs: bool,

    pub high_variability_threshold: f64,
    pub medium_variability_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            target_account: DEFAULT_TARGET_ACCOUNT.to_string(),
            input_dir: PathBuf::from("data/extracted"),
            registry_path: PathBuf::from("data/registry/Relatorio_cadop.csv"),
            consolidated_output: PathBuf::from("output/consolidado_despesas.csv"),
            aggregated_output: PathBuf::from("output/despesas_agregadas.csv"),
            audit_db: None,
            log_level: "info".to_string(),
            package_outputs: false,
            high_variability_threshold: HIGH_VARIABILITY_THRESHOLD,
            medium_variability_threshold: MEDIUM_VARIABILITY_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content).context("Invalid pipeline config")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
