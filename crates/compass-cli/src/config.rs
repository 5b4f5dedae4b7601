//! CLI configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use compass_core::scoring::ScoringConfig;
use compass_report::radar::RadarLayout;

/// Top-level compass configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompassConfig {
    /// JSON file holding the item bank, assembled tests and results.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Seed for question selection. Unset means a fresh draw every time.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub radar: RadarLayout,
    /// Where rendered reports are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./compass-state.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./compass-reports")
}

impl Default for CompassConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            seed: None,
            scoring: ScoringConfig::default(),
            radar: RadarLayout::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order:
/// 1. `compass.toml` in the current directory
/// 2. `~/.config/compass/config.toml`
///
/// Environment variable overrides: `COMPASS_STATE`, `COMPASS_SEED`.
pub fn load_config_from(path: Option<&Path>) -> Result<CompassConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("compass.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<CompassConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "config loaded");
            config
        }
        None => CompassConfig::default(),
    };

    // Apply env var overrides
    if let Ok(state) = std::env::var("COMPASS_STATE") {
        config.state_path = PathBuf::from(state);
    }
    if let Ok(seed) = std::env::var("COMPASS_SEED") {
        let seed = seed
            .parse::<u64>()
            .with_context(|| format!("COMPASS_SEED is not a number: {seed}"))?;
        config.seed = Some(seed);
    }

    config.state_path = resolve_path(&config.state_path);
    config.output_dir = resolve_path(&config.output_dir);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("compass"))
}
