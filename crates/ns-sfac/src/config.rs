//! Serializable provider configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SfError};

/// Inputs needed to construct a [`crate::ScaleFactorProvider`] from a table file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactorConfig {
    /// Object collection to read from each event (e.g. `"muons"`).
    pub collection: String,
    /// Table file path.
    pub file: PathBuf,
    /// Table path inside the file; its name declares the axis orientation.
    pub table: String,
    /// Flat fractional systematic added in quadrature, in `[0, 1)`.
    #[serde(default)]
    pub sys_fraction: f64,
    /// Emit one diagnostic line per object during `weight`.
    #[serde(default)]
    pub verbose: bool,
}

impl ScaleFactorConfig {
    /// Create a config with no extra systematic and diagnostics off.
    pub fn new(
        collection: impl Into<String>,
        file: impl Into<PathBuf>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            file: file.into(),
            table: table.into(),
            sys_fraction: 0.0,
            verbose: false,
        }
    }

    /// Set the flat systematic fraction.
    pub fn sys_fraction(mut self, fraction: f64) -> Self {
        self.sys_fraction = fraction;
        self
    }

    /// Enable or disable per-object diagnostics.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Parse a config from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| SfError::Configuration(format!("invalid scale-factor config: {e}")))
    }

    /// Read a JSON config from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SfError::Configuration(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }
}
