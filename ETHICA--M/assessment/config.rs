use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Runtime configuration for a pipeline deployment. Every field has a
/// default so a missing or partial TOML file still yields a runnable setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Directory of framework corpus documents to ingest at startup.
    pub corpus_dir: PathBuf,
    /// Directory report artifacts are written to.
    pub output_dir: PathBuf,
    /// Directory state snapshots are written to.
    pub checkpoint_dir: PathBuf,
    /// JSONL log file path; unset disables file logging.
    pub log_path: Option<PathBuf>,
    /// JSONL event log path; unset disables the file event publisher.
    pub event_log_path: Option<PathBuf>,
    /// Per-adapter-call timeout in milliseconds.
    pub adapter_timeout_ms: u64,
    /// Driver iteration ceiling before a run is declared stalled.
    pub max_iterations: usize,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data/corpus"),
            output_dir: PathBuf::from("outputs/reports"),
            checkpoint_dir: PathBuf::from("outputs/states"),
            log_path: None,
            event_log_path: None,
            adapter_timeout_ms: 60_000,
            max_iterations: 16,
        }
    }
}

impl AssessmentConfig {
    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Adapter timeout as a [`std::time::Duration`].
    #[must_use]
    pub const fn adapter_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.adapter_timeout_ms)
    }
}
