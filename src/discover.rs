//! Article discovery.
//!
//! Walks the posts tree and returns two sorted collections, both relative to
//! the posts root:
//!
//! - every file whose extension matches the configured article extension
//! - every directory holding at least one article, directly or through a
//!   descendant; these must exist in the output tree before pages are written
//!
//! No file content is read. Hidden entries (leading `.`) are not descended
//! into. A subdirectory that can't be read is logged and skipped; only a
//! missing root is fatal.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("posts directory not found: {}", .0.display())]
    RootMissing(PathBuf),
}

/// Result of walking the posts tree.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Article files, relative to the root.
    pub articles: Vec<PathBuf>,
    /// Directories containing articles, relative to the root. Never includes
    /// the root itself.
    pub dirs: Vec<PathBuf>,
    /// Subdirectories that couldn't be read, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

pub fn discover(root: &Path, extension: &str) -> Result<Discovery, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::RootMissing(root.to_path_buf()));
    }

    let mut articles = BTreeSet::new();
    let mut dirs = BTreeSet::new();
    let mut skipped = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.strip_prefix(root).unwrap_or(p).to_path_buf())
                    .unwrap_or_default();
                warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                skipped.push((path, err.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        for ancestor in rel.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
        articles.insert(rel.to_path_buf());
    }

    Ok(Discovery {
        articles: articles.into_iter().collect(),
        dirs: dirs.into_iter().collect(),
        skipped,
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
