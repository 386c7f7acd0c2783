use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clock::Millis;
use crate::error::ConfigError;
use crate::grid::DEFAULT_MIN_ROWS;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Grids are padded with empty rows up to this count
    pub min_rows: usize,
    /// Columns of a newly created document
    pub default_columns: Vec<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            min_rows: DEFAULT_MIN_ROWS,
            default_columns: vec!["A".to_string(), "B".to_string(), "C".to_string()],
        }
    }
}

/// Timing and tolerance knobs for the reconciler and save scheduler.
///
/// These are heuristics, not proven bounds; they assume a single active editor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Idle time before a burst of cell edits is saved
    pub debounce_ms: Millis,
    /// Candidates arriving this soon after our own save are treated as its echo
    pub echo_grace_ms: Millis,
    /// How far past a save's completion (or a destructive rejection) the suppression window reaches
    pub suppression_margin_ms: Millis,
    /// A candidate must be newer than the last known write by more than this
    pub stale_margin_ms: Millis,
    /// How many filled cells a candidate may lose before it counts as destructive
    pub destructive_tolerance: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 800,
            echo_grace_ms: 3_000,
            suppression_margin_ms: 5_000,
            stale_margin_ms: 500,
            destructive_tolerance: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding document files, recovery hints and the log
    pub dir: PathBuf,
    /// Quiet time the file watcher waits for before reporting a burst of writes
    pub watch_debounce_ms: Millis,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".runsheet"),
            watch_debounce_ms: 200,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub sync: SyncConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
