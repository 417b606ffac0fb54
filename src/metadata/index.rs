//! Pre-scanned path index
//!
//! A recursive walk of the served root builds an immutable pathname -> entry
//! map. Rescans build a complete new snapshot and swap it in with a single
//! atomic store; a reader that loaded the old snapshot keeps a consistent view
//! until it drops it.

use crate::http::mime::ContentTypes;
use crate::logger;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use walkdir::WalkDir;

use super::descriptor::ResourceKind;

/// One indexed filesystem entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: PathBuf,
    pub kind: ResourceKind,
    pub content_type: String,
}

/// Immutable result of one directory walk
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    entries: HashMap<String, IndexEntry>,
    /// Monotonic scan counter, 1 for the initial scan
    generation: u64,
    scanned_at: Option<SystemTime>,
}

impl IndexSnapshot {
    pub fn get(&self, pathname: &str) -> Option<&IndexEntry> {
        self.entries.get(pathname)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn scanned_at(&self) -> Option<SystemTime> {
        self.scanned_at
    }
}

/// Swappable index over a root directory
#[derive(Debug)]
pub struct ResourceIndex {
    root: PathBuf,
    content_types: Arc<ContentTypes>,
    current: ArcSwap<IndexSnapshot>,
}

impl ResourceIndex {
    /// Walk `root` once and build the initial snapshot
    pub async fn build(root: PathBuf, content_types: Arc<ContentTypes>) -> io::Result<Self> {
        let snapshot = scan(root.clone(), Arc::clone(&content_types), 1).await?;
        Ok(Self {
            root,
            content_types,
            current: ArcSwap::from_pointee(snapshot),
        })
    }

    /// Current snapshot; hold the returned `Arc` for a consistent view
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.load_full()
    }

    /// Rebuild the index from scratch and atomically replace the snapshot
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn rescan(&self) -> io::Result<usize> {
        let generation = self.current.load().generation + 1;
        let snapshot = scan(self.root.clone(), Arc::clone(&self.content_types), generation).await?;
        let count = snapshot.len();
        self.current.store(Arc::new(snapshot));
        logger::log_rescan(&self.root, count, generation);
        Ok(count)
    }
}

async fn scan(
    root: PathBuf,
    content_types: Arc<ContentTypes>,
    generation: u64,
) -> io::Result<IndexSnapshot> {
    tokio::task::spawn_blocking(move || scan_blocking(&root, &content_types, generation))
        .await
        .map_err(io::Error::other)?
}

fn scan_blocking(
    root: &Path,
    content_types: &ContentTypes,
    generation: u64,
) -> io::Result<IndexSnapshot> {
    let mut entries = HashMap::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                return Err(e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("cannot walk root directory")));
            }
            Err(e) => {
                logger::log_warning(&format!("Skipping unreadable index entry: {e}"));
                continue;
            }
        };

        let Some(pathname) = pathname_for(root, entry.path()) else {
            logger::log_warning(&format!(
                "Skipping non UTF-8 path during index scan: {}",
                entry.path().display()
            ));
            continue;
        };

        let file_type = entry.file_type();
        let kind = if file_type.is_file() {
            ResourceKind::File
        } else if file_type.is_dir() {
            ResourceKind::Directory
        } else {
            continue;
        };

        let content_type = content_types.resolve(&pathname).to_string();
        entries.insert(
            pathname,
            IndexEntry {
                path: entry.into_path(),
                kind,
                content_type,
            },
        );
    }

    Ok(IndexSnapshot {
        entries,
        generation,
        scanned_at: Some(SystemTime::now()),
    })
}

/// `/`-separated pathname of `path` relative to `root`
fn pathname_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut pathname = String::from("/");
    let mut first = true;
    for component in relative.components() {
        if !first {
            pathname.push('/');
        }
        pathname.push_str(component.as_os_str().to_str()?);
        first = false;
    }
    Some(pathname)
}
