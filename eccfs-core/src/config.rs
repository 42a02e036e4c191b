use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EccError, Result};

fn default_reverify_interval_secs() -> u64 {
    crate::cache::DEFAULT_REVERIFY_INTERVAL.as_secs()
}

/// Where the overlay finds its data.
///
/// The import dir shadows the ecc dirs; ecc dirs are searched in order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OverlayConfig {
    pub import_dir: PathBuf,
    pub ecc_dirs: Vec<PathBuf>,
    #[serde(default = "default_reverify_interval_secs")]
    pub reverify_interval_secs: u64,
}

impl OverlayConfig {
    pub fn new(import_dir: impl Into<PathBuf>, ecc_dirs: Vec<PathBuf>) -> Self {
        Self {
            import_dir: import_dir.into(),
            ecc_dirs,
            reverify_interval_secs: default_reverify_interval_secs(),
        }
    }

    /// Build from mount-style options: `--importdir=DIR --eccdirs=A,B,C`.
    pub fn from_options(import_dir: &str, ecc_dirs: &str) -> Result<Self> {
        let dirs = ecc_dirs.split(',').filter(|s| !s.is_empty()).map(PathBuf::from).collect();
        let cfg = Self::new(import_dir, dirs);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path)?;
        let cfg: Self = serde_json::from_reader(f)
            .map_err(|e| EccError::InvalidArgument(format!("config {}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_reverify_interval(mut self, interval: Duration) -> Self {
        self.reverify_interval_secs = interval.as_secs();
        self
    }

    pub fn reverify_interval(&self) -> Duration {
        Duration::from_secs(self.reverify_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        check_dir("importdir", &self.import_dir)?;
        if self.ecc_dirs.is_empty() {
            return Err(EccError::InvalidArgument("at least one eccdir is required".to_string()));
        }
        for d in &self.ecc_dirs {
            check_dir("eccdir", d)?;
        }
        Ok(())
    }
}

fn check_dir(what: &str, dir: &Path) -> Result<()> {
    let s = dir.to_string_lossy();
    if s.is_empty() {
        return Err(EccError::InvalidArgument(format!("{what} is required")));
    }
    if s.ends_with('/') || s.ends_with(std::path::MAIN_SEPARATOR) {
        return Err(EccError::InvalidArgument(format!(
            "{what} {s:?} must not end in a path separator"
        )));
    }
    Ok(())
}
