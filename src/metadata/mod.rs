//! Resource metadata module
//!
//! Finds out what a canonical pathname refers to on disk. Two strategies:
//! - Lazy: stat the joined path on every request
//! - Indexed: look the pathname up in a pre-scanned index, then stat the
//!   indexed location for fresh size and modification time
//!
//! Any stat failure is reported as a missing resource, never as an error.

mod descriptor;
mod index;

pub use descriptor::{ResourceDescriptor, ResourceKind};
pub use index::{IndexEntry, IndexSnapshot, ResourceIndex};

use crate::http::mime::ContentTypes;
use crate::routing::join_under_root;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
enum Strategy {
    Lazy,
    Indexed(ResourceIndex),
}

/// Produces a [`ResourceDescriptor`] per request
#[derive(Debug)]
pub struct MetadataProvider {
    root: PathBuf,
    content_types: Arc<ContentTypes>,
    strategy: Strategy,
}

impl MetadataProvider {
    /// Stat on every request
    pub const fn lazy(root: PathBuf, content_types: Arc<ContentTypes>) -> Self {
        Self {
            root,
            content_types,
            strategy: Strategy::Lazy,
        }
    }

    /// Scan `root` up front and serve lookups from the index
    pub async fn indexed(root: PathBuf, content_types: Arc<ContentTypes>) -> io::Result<Self> {
        let index = ResourceIndex::build(root.clone(), Arc::clone(&content_types)).await?;
        Ok(Self {
            root,
            content_types,
            strategy: Strategy::Indexed(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Current index snapshot, `None` in lazy mode
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        match &self.strategy {
            Strategy::Lazy => None,
            Strategy::Indexed(index) => Some(index.snapshot()),
        }
    }

    /// Rebuild the index; returns the new entry count, `None` in lazy mode
    pub async fn rescan(&self) -> io::Result<Option<usize>> {
        match &self.strategy {
            Strategy::Lazy => Ok(None),
            Strategy::Indexed(index) => index.rescan().await.map(Some),
        }
    }

    /// Describe the resource behind a canonical pathname
    pub async fn describe(&self, pathname: &str) -> ResourceDescriptor {
        match &self.strategy {
            Strategy::Lazy => {
                let path = join_under_root(&self.root, pathname);
                let content_type = self.content_types.resolve(pathname).to_string();
                stat(pathname, path, content_type).await
            }
            Strategy::Indexed(index) => {
                let snapshot = index.snapshot();
                match snapshot.get(pathname) {
                    Some(entry) => {
                        stat(pathname, entry.path.clone(), entry.content_type.clone()).await
                    }
                    None => {
                        ResourceDescriptor::missing(pathname, join_under_root(&self.root, pathname))
                    }
                }
            }
        }
    }
}

/// Stat a path; failures and special files become a missing descriptor
async fn stat(pathname: &str, path: PathBuf, content_type: String) -> ResourceDescriptor {
    let Ok(meta) = tokio::fs::metadata(&path).await else {
        return ResourceDescriptor::missing(pathname, path);
    };

    let kind = if meta.is_file() {
        ResourceKind::File
    } else if meta.is_dir() {
        ResourceKind::Directory
    } else {
        return ResourceDescriptor::missing(pathname, path);
    };

    let Ok(modified) = meta.modified() else {
        return ResourceDescriptor::missing(pathname, path);
    };

    ResourceDescriptor {
        pathname: pathname.to_string(),
        path,
        kind,
        content_type,
        content_length: meta.len(),
        modified,
    }
}
