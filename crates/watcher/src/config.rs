//! Watcher configuration

use crate::error::{Result, WatchError};
use crate::ignore::IgnoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default quiet period before a changed path is reconciled
pub const DEFAULT_DEBOUNCE_MS: u64 = 10;

/// Tree watcher configuration
///
/// ```toml
/// root = "/srv/project"
/// watch = true
/// debounce_ms = 25
///
/// [ignore]
/// use_gitignore = true
/// additional_patterns = ["*.tmp"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Directory to watch
    pub root: PathBuf,

    /// Register native watches (default: true)
    ///
    /// When disabled only the initial enumeration runs and no events are
    /// ever emitted.
    #[serde(default = "default_true")]
    pub watch: bool,

    /// Debounce interval in milliseconds (default: 10)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Gitignore-style filtering (optional)
    #[serde(default)]
    pub ignore: Option<IgnoreConfig>,
}

impl WatcherConfig {
    /// Configuration with defaults for everything but the root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            watch: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ignore: None,
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| WatchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Reject values the watcher cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(WatchError::InvalidConfig("root must not be empty".into()));
        }
        if self.debounce_ms == 0 {
            return Err(WatchError::InvalidConfig(
                "debounce_ms must be a positive number of milliseconds".into(),
            ));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = Some(ignore);
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
