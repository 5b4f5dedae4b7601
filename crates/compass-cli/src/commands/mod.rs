//! Subcommand implementations.

pub mod assemble;
pub mod import;
pub mod init;
pub mod quota;
pub mod report;
pub mod results;
pub mod review;
pub mod submit;
pub mod take;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use compass_core::assembler::TestAssembler;
use compass_core::parser::{load_bank_directory, parse_bank, ItemBank};
use compass_core::scoring::ScoringEngine;
use compass_core::store::{InMemoryStore, Snapshot};
use compass_report::document::ReportService;

use crate::config::{load_config_from, CompassConfig};

/// Options shared by every command that touches the state file.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub state: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn load_config(&self) -> Result<CompassConfig> {
        let mut config = load_config_from(self.config.as_deref())?;
        if let Some(state) = &self.state {
            config.state_path = state.clone();
        }
        Ok(config)
    }
}

/// Load one bank file, or every bank of a directory folded together.
pub fn load_banks(path: &Path) -> Result<Vec<ItemBank>> {
    if path.is_dir() {
        load_bank_directory(path)
    } else {
        Ok(vec![parse_bank(path)?])
    }
}

/// The loaded state file plus the services working on it.
pub struct Workspace {
    pub config: CompassConfig,
    pub store: Arc<InMemoryStore>,
}

impl Workspace {
    /// Open an existing state file.
    pub fn open(opts: &GlobalOpts) -> Result<Self> {
        let config = opts.load_config()?;
        if !config.state_path.exists() {
            anyhow::bail!(
                "state file not found: {} (run `compass import --bank <path>` first)",
                config.state_path.display()
            );
        }
        let snapshot = Snapshot::load_json(&config.state_path)?;
        let store = InMemoryStore::from_snapshot(snapshot).with_context(|| {
            format!("inconsistent state file: {}", config.state_path.display())
        })?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn from_store(config: CompassConfig, store: InMemoryStore) -> Self {
        Self {
            config,
            store: Arc::new(store),
        }
    }

    /// Write the state back to disk.
    pub fn save(&self) -> Result<()> {
        let snapshot = self.store.snapshot()?;
        snapshot.save_json(&self.config.state_path)?;
        tracing::debug!(path = %self.config.state_path.display(), "state saved");
        Ok(())
    }

    pub fn assembler(&self) -> TestAssembler {
        TestAssembler::new(self.store.clone(), self.store.clone()).with_seed(self.config.seed)
    }

    pub fn scoring(&self) -> ScoringEngine {
        ScoringEngine::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.config.scoring,
        )
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(self.store.clone(), self.store.clone(), self.config.radar)
    }
}

/// Output format of listing commands.
pub fn check_format(format: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&format) {
        Ok(())
    } else {
        anyhow::bail!(
            "unknown format: {format} (expected one of: {})",
            allowed.join(", ")
        )
    }
}
