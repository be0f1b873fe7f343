use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::error::{IngestError, Result};

/// Ingest configuration, loadable from a TOML file.
///
/// CLI flags override file values, which override the defaults here. `ions`
/// and `unique_level_identifier` are accepted for interface compatibility
/// with sibling line-list readers; no operation consumes them yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Local path or http(s) URL of the line list. `None` selects the
    /// built-in public VALD URL.
    #[serde(default)]
    pub source: Option<String>,

    /// Root directory of the output store.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Ion filter (inert; carried for future row filtering).
    #[serde(default)]
    pub ions: Option<Vec<String>>,

    /// Attributes identifying unique levels (inert; carried for future
    /// deduplication alongside atomic number and ion charge).
    #[serde(default = "default_unique_level_identifier")]
    pub unique_level_identifier: Vec<String>,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("data/vald")
}

fn default_unique_level_identifier() -> Vec<String> {
    vec!["energy".to_string(), "j".to_string()]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: None,
            out_dir: default_out_dir(),
            ions: None,
            unique_level_identifier: default_unique_level_identifier(),
        }
    }
}

impl IngestConfig {
    /// Read a config file, falling back to defaults for absent keys.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| IngestError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Apply CLI overrides on top of file/default values. `ions` is a
    /// comma-separated list.
    pub fn override_with(
        mut self,
        source: Option<String>,
        out: Option<PathBuf>,
        ions: Option<String>,
    ) -> Self {
        if source.is_some() {
            self.source = source;
        }
        if let Some(out) = out {
            self.out_dir = out;
        }
        if let Some(list) = ions {
            self.ions = Some(list.split(',').map(|s| s.trim().to_string()).collect());
        }
        self
    }
}
