use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use planhist_blame::BlameOptions;
use planhist_changes::ChangeListOptions;
use planhist_types::{ColumnRegistry, ReportContext};

pub const CONFIG_FILE: &str = "planhist.toml";

/// Settings read from `planhist.toml`. Command-line flags override them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display columns keyed by attribute name.
    pub columns: ColumnRegistry,
    pub changes: ChangeListOptions,
    pub blame: BlameOptions,
}

impl Config {
    /// Load `explicit` if given, else `planhist.toml` in the history
    /// directory if present, else defaults.
    pub fn load(explicit: Option<&Path>, history_dir: &Path) -> anyhow::Result<Self> {
        let path: PathBuf = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = history_dir.join(CONFIG_FILE);
                if !path.is_file() {
                    return Ok(Self::default());
                }
                path
            }
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("parsing {}", path.display()))?;
        debug!(path = %path.display(), columns = config.columns.len(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn context(&self) -> ReportContext {
        ReportContext::new(self.columns.clone())
    }
}
