//! Remote image localization.
//!
//! Makes each article self-contained: every markdown image pointing at an
//! `http(s)` URL is downloaded into the asset store under the posts tree and
//! the article is rewritten to reference the local copy.
//!
//! ## Content addressing
//!
//! Stored files are named `{sha256}.{ext}`, where the hash covers the raw
//! downloaded bytes and the extension comes from the bytes' magic number (a
//! URL's apparent extension is never trusted). Byte-identical downloads thus
//! land on one file no matter how many URLs or articles point at them, and a
//! stored file never changes once written.
//!
//! Several articles may store the same asset concurrently. Each write goes
//! to a temporary file followed by a no-clobber rename: the first writer
//! wins, later writers find the file present and do nothing. The content is
//! identical by construction, so no lock is needed.
//!
//! ## Two phases
//!
//! 1. **Download** (parallel): distinct URLs are fetched, fingerprinted and
//!    stored. The phase yields a `url → asset` map and touches no shared
//!    mutable state besides the store.
//! 2. **Rewrite** (sequential, pure): every occurrence of a URL in the map,
//!    inside an image expression or not, is replaced by the relative local
//!    path.
//!
//! If any download fails the whole article fails and its source is left
//! untouched. Localized text contains no remote image expression, so running
//! the localizer again is a no-op.

use crate::config::ASSET_DIR;
use crate::fetch::{FetchError, Fetcher};
use crate::types::ArticleSource;
use crate::write::{WriteError, write_if_changed, write_new};
use rayon::prelude::*;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

/// Markdown image with an absolute http(s) URL and an optional title:
/// `![alt](https://host/pic)` or `![alt](https://host/pic "caption")`.
static REMOTE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]\n]*\]\((https?://[^)\s]+)(?:\s+"[^"\n]*")?\)"#)
        .expect("remote image pattern must compile")
});

#[derive(Error, Debug)]
pub enum LocalizeError {
    #[error("download failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("unrecognized image format for {url}")]
    UnknownFormat { url: String },
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// A remote image found in an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub remote_url: String,
    /// The whole image expression as it appears in the text.
    pub match_span: String,
}

/// A downloaded resource persisted in the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalizedAsset {
    pub content_hash: String,
    pub extension: String,
    /// Path relative to the posts root, e.g. `images/3fa1….png`.
    pub local_relative_path: String,
}

impl LocalizedAsset {
    pub fn filename(&self) -> String {
        format!("{}.{}", self.content_hash, self.extension)
    }

    /// Reference to this asset from an article `depth` directories deep.
    pub fn reference_from(&self, depth: usize) -> String {
        format!("{}{}", "../".repeat(depth), self.local_relative_path)
    }
}

/// Result of localizing one article's text.
#[derive(Debug, Clone, Default)]
pub struct Localized {
    pub text: String,
    /// Remote URL → stored asset, for every URL found in the article.
    pub assets: BTreeMap<String, LocalizedAsset>,
    /// How many of those assets this call created in the store.
    pub created: usize,
}

/// Shared content-addressed store under `<posts>/images`.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_exists(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Fingerprint `bytes`, name them by content and store them if new.
    ///
    /// Returns the asset and whether this call created the file.
    pub fn put(&self, url: &str, bytes: &[u8]) -> Result<(LocalizedAsset, bool), LocalizeError> {
        let extension = detect_extension(bytes).ok_or_else(|| LocalizeError::UnknownFormat {
            url: url.to_string(),
        })?;
        let content_hash = fingerprint(bytes);
        let filename = format!("{content_hash}.{extension}");
        let created = write_new(&self.dir.join(&filename), bytes)?;
        let asset = LocalizedAsset {
            content_hash,
            extension: extension.to_string(),
            local_relative_path: format!("{ASSET_DIR}/{filename}"),
        };
        Ok((asset, created))
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Canonical file extension for the image format `bytes` start with.
pub fn detect_extension(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    format.extensions_str().first().copied()
}

/// Every remote image expression in `text`, in order of appearance.
pub fn find_remote_images(text: &str) -> Vec<AssetReference> {
    REMOTE_IMAGE
        .captures_iter(text)
        .map(|caps| AssetReference {
            remote_url: caps[1].to_string(),
            match_span: caps[0].to_string(),
        })
        .collect()
}

/// Replace every occurrence of each URL in `assets` with its path relative
/// to an article `depth` directories deep.
///
/// Occurrences outside image expressions are replaced too, so a linked
/// image `[![](u)](u)` ends up fully local. An occurrence only counts when
/// the URL isn't immediately continued by more URL characters: with
/// `https://x/a` localized, `https://x/ab` stays as it is.
pub fn rewrite(text: &str, assets: &BTreeMap<String, LocalizedAsset>, depth: usize) -> String {
    let mut urls: Vec<(&str, String)> = assets
        .iter()
        .map(|(url, asset)| (url.as_str(), asset.reference_from(depth)))
        .collect();
    // Longest first, so `https://x/a?v=2` wins over `https://x/a`.
    urls.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        let hit = urls.iter().find(|(url, _)| {
            rest.starts_with(url) && rest[url.len()..].chars().next().is_none_or(ends_url)
        });
        match hit {
            Some((url, reference)) => {
                out.push_str(reference);
                rest = &rest[url.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

fn ends_url(c: char) -> bool {
    c.is_whitespace() || matches!(c, ')' | ']' | '>' | '"' | '\'')
}

/// Download, store and rewrite the remote images of one article.
///
/// Does not persist anything besides store entries; see [`localize_in_place`].
pub fn localize(
    source: &ArticleSource,
    store: &AssetStore,
    fetcher: &impl Fetcher,
) -> Result<Localized, LocalizeError> {
    let urls: BTreeSet<String> = find_remote_images(&source.raw_text)
        .into_iter()
        .map(|r| r.remote_url)
        .collect();
    if urls.is_empty() {
        return Ok(Localized {
            text: source.raw_text.clone(),
            ..Localized::default()
        });
    }

    let downloaded: Vec<(String, LocalizedAsset, bool)> = urls
        .into_par_iter()
        .map(|url| {
            debug!(%url, article = %source.relative_path.display(), "downloading");
            let bytes = fetcher.fetch(&url).map_err(|e| LocalizeError::Fetch {
                url: url.clone(),
                source: e,
            })?;
            let (asset, created) = store.put(&url, &bytes)?;
            debug!(%url, file = %asset.filename(), created, "stored");
            Ok((url, asset, created))
        })
        .collect::<Result<_, LocalizeError>>()?;

    let created = downloaded.iter().filter(|(_, _, created)| *created).count();
    let assets: BTreeMap<String, LocalizedAsset> = downloaded
        .into_iter()
        .map(|(url, asset, _)| (url, asset))
        .collect();
    let text = rewrite(&source.raw_text, &assets, source.depth());

    Ok(Localized {
        text,
        assets,
        created,
    })
}

/// Localize `source` and persist the rewritten text over its file.
///
/// `source.raw_text` is updated only after every download succeeded and the
/// file was written; on error both the file and `source` are untouched.
pub fn localize_in_place(
    posts_root: &Path,
    source: &mut ArticleSource,
    store: &AssetStore,
    fetcher: &impl Fetcher,
) -> Result<Localized, LocalizeError> {
    let localized = localize(source, store, fetcher)?;
    if localized.text != source.raw_text {
        write_if_changed(&posts_root.join(&source.relative_path), &localized.text)?;
        source.raw_text.clone_from(&localized.text);
    }
    Ok(localized)
}
