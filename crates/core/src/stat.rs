//! Stat records for tracked entries

use serde::{Deserialize, Serialize};
use std::fs::{FileType, Metadata};
use std::time::SystemTime;

/// Type of tracked entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (never followed)
    Symlink,
    /// Sockets, fifos, devices
    Other,
}

impl EntryKind {
    /// Classify a file type without following symlinks
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// Last observed state of an entry
///
/// Only presence and `kind` drive change classification; `size` and `mtime`
/// are carried along for consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    pub kind: EntryKind,
    pub size: u64,
    pub mtime: Option<SystemTime>,
}

impl StatRecord {
    pub fn new(kind: EntryKind, size: u64, mtime: Option<SystemTime>) -> Self {
        Self { kind, size, mtime }
    }

    /// Create a regular file record
    pub fn file(size: u64, mtime: Option<SystemTime>) -> Self {
        Self::new(EntryKind::File, size, mtime)
    }

    /// Create a directory record
    pub fn directory(mtime: Option<SystemTime>) -> Self {
        Self::new(EntryKind::Directory, 0, mtime)
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl From<&Metadata> for StatRecord {
    fn from(metadata: &Metadata) -> Self {
        Self {
            kind: EntryKind::from_file_type(metadata.file_type()),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        }
    }
}
