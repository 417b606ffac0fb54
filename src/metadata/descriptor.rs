// Resource descriptor types
// What a request learns about its target before any validator is computed

use std::path::PathBuf;
use std::time::SystemTime;

/// Kind of filesystem entity behind a pathname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    File,
    Directory,
    /// Missing, unreadable, or neither a regular file nor a directory
    Missing,
}

/// One filesystem entity addressed by a request
///
/// Size and modification time are only meaningful when the resource exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Canonical request pathname, e.g. `/css/site.css`
    pub pathname: String,
    /// Absolute location on disk
    pub path: PathBuf,
    pub kind: ResourceKind,
    pub content_type: String,
    pub content_length: u64,
    pub modified: SystemTime,
}

impl ResourceDescriptor {
    pub fn missing(pathname: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            pathname: pathname.into(),
            path: path.into(),
            kind: ResourceKind::Missing,
            content_type: String::new(),
            content_length: 0,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    pub fn exists(&self) -> bool {
        self.kind != ResourceKind::Missing
    }

    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Directory
    }
}
