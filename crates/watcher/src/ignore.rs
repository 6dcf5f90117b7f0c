//! Gitignore-style filtering
//!
//! Supports multiple sources of ignore patterns:
//! 1. Built-in patterns (VCS metadata directories and editor temp files)
//! 2. .gitignore at the root (optional, enabled by default)
//! 3. Extra ignore files at the root, e.g. `.watchignore` (optional)
//! 4. Config-based patterns (additional custom patterns)

use crate::filter::Filter;
use anyhow::Result;
use async_trait::async_trait;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use treewatch_core::{RelPath, StatRecord};

/// Directories that are never tracked when built-in patterns are enabled
const VCS_DIRS: &[&str] = &[".git", ".jj", ".hg", ".svn"];

/// Ignore-rule filter
///
/// Precedence, highest first:
/// 1. Built-in patterns (when enabled)
/// 2. Extra ignore files and additional patterns (a `!pattern` here
///    re-includes something .gitignore excludes)
/// 3. .gitignore
pub struct IgnoreFilter {
    /// Watched root; ignore files are read from here
    root: PathBuf,

    /// Gitignore patterns (optional)
    gitignore: Option<Gitignore>,

    /// Extra ignore files plus additional patterns (optional)
    overrides: Option<Gitignore>,

    /// Configuration
    config: IgnoreConfig,
}

impl IgnoreFilter {
    /// Load ignore rules for a root directory
    pub fn load(root: &Path, config: IgnoreConfig) -> Result<Self> {
        let mut filter = Self {
            root: root.to_path_buf(),
            gitignore: None,
            overrides: None,
            config,
        };

        filter.reload()?;
        Ok(filter)
    }

    /// Re-read ignore files from disk
    pub fn reload(&mut self) -> Result<()> {
        self.gitignore = if self.config.use_gitignore {
            let gitignore_path = self.root.join(".gitignore");
            if gitignore_path.exists() {
                let mut builder = GitignoreBuilder::new(&self.root);
                if let Some(err) = builder.add(&gitignore_path) {
                    return Err(err.into());
                }
                Some(builder.build()?)
            } else {
                None
            }
        } else {
            None
        };

        let mut builder = GitignoreBuilder::new(&self.root);
        let mut has_overrides = false;
        for name in &self.config.ignore_files {
            let path = self.root.join(name);
            if path.exists() {
                if let Some(err) = builder.add(&path) {
                    return Err(err.into());
                }
                has_overrides = true;
            }
        }
        for pattern in &self.config.additional_patterns {
            builder.add_line(None, pattern)?;
            has_overrides = true;
        }
        self.overrides = if has_overrides {
            Some(builder.build()?)
        } else {
            None
        };

        Ok(())
    }

    /// Check if a path should be ignored
    pub fn should_ignore(&self, path: &RelPath, is_dir: bool) -> bool {
        if self.config.builtin && is_builtin_ignored(path) {
            return true;
        }

        let relative = Path::new(path.as_str());

        if let Some(ref overrides) = self.overrides {
            match overrides.matched_path_or_any_parents(relative, is_dir) {
                Match::Ignore(_) => return true,
                Match::Whitelist(_) => return false,
                Match::None => {}
            }
        }

        if let Some(ref gitignore) = self.gitignore {
            if gitignore
                .matched_path_or_any_parents(relative, is_dir)
                .is_ignore()
            {
                return true;
            }
        }

        false
    }

    /// Get number of active ignore sources
    pub fn active_sources(&self) -> usize {
        let mut count = 0;
        if self.config.builtin {
            count += 1;
        }
        if self.gitignore.is_some() {
            count += 1;
        }
        if self.overrides.is_some() {
            count += 1;
        }
        count
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Filter for IgnoreFilter {
    async fn accept(&self, path: &RelPath, stat: &StatRecord) -> Result<bool> {
        Ok(!self.should_ignore(path, stat.is_dir()))
    }
}

/// Built-in patterns: VCS metadata anywhere in the path, editor temp files
fn is_builtin_ignored(path: &RelPath) -> bool {
    if path
        .as_str()
        .split(treewatch_core::path::SEPARATOR)
        .any(|component| VCS_DIRS.contains(&component))
    {
        return true;
    }

    is_editor_temp(path.file_name())
}

/// Editor swap/backup files and OS metadata files
fn is_editor_temp(filename: &str) -> bool {
    // Vim swap files
    if filename.ends_with(".swp")
        || filename.ends_with(".swo")
        || filename.ends_with(".swn")
        || filename.ends_with(".swm")
    {
        return true;
    }

    // Vim/Emacs backups
    if filename.ends_with('~') {
        return true;
    }

    // Emacs auto-save and lock files
    if (filename.len() > 1 && filename.starts_with('#') && filename.ends_with('#'))
        || filename.starts_with(".#")
    {
        return true;
    }

    // MacOS/Windows system files
    filename == ".DS_Store"
        || filename.starts_with("._")
        || filename == "Thumbs.db"
        || filename == "desktop.ini"
}

/// Ignore configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Apply built-in patterns (default: true)
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// Use .gitignore patterns (default: true)
    #[serde(default = "default_true")]
    pub use_gitignore: bool,

    /// Extra ignore files read from the root (default: `.watchignore`)
    #[serde(default = "default_ignore_files")]
    pub ignore_files: Vec<String>,

    /// Additional patterns from config
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            use_gitignore: true,
            ignore_files: default_ignore_files(),
            additional_patterns: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ignore_files() -> Vec<String> {
    vec![".watchignore".to_string()]
}
