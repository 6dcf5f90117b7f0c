//! Host filesystem access through tokio

use super::FileSystem;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use treewatch_core::StatRecord;

/// [`FileSystem`] backed by `tokio::fs`
///
/// Symlinks are reported as symlinks and never followed, so link cycles
/// cannot make enumeration loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

#[async_trait]
impl FileSystem for HostFs {
    async fn stat(&self, path: &Path) -> io::Result<StatRecord> {
        let metadata = tokio::fs::symlink_metadata(path).await?;
        Ok(StatRecord::from(&metadata))
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name());
        }
        Ok(names)
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        tokio::fs::canonicalize(path).await
    }
}
