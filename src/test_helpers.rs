//! Shared test utilities: a network-free fetcher, fake image payloads and
//! small fixture builders.

use crate::fetch::{FetchError, Fetcher};
use crate::types::ArticleSource;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// PNG signature plus a few payload bytes. Only the magic number matters for
/// type detection.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRpostsmith";

/// A second, distinct PNG payload.
pub const OTHER_PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRsomething else";

pub const GIF_BYTES: &[u8] = b"GIF89a\x01\0\x01\0\0\0\0;";

/// In-memory [`Fetcher`]. URLs without a registered response fail with
/// HTTP 404. Every call is recorded.
///
/// Uses Mutex (not RefCell) so it is Sync and works under rayon.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: &[u8]) -> Self {
        self.responses.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// URLs fetched so far, sorted.
    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(404))
    }
}

/// An in-memory article at `path` (relative to the posts root).
pub fn article(path: &str, text: &str) -> ArticleSource {
    ArticleSource {
        relative_path: PathBuf::from(path),
        raw_text: text.to_string(),
    }
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}
