//! # postsmith
//!
//! A static site generator for markdown blogs whose articles end up fully
//! self-contained: every remote image an article references is downloaded
//! once, stored under a content-derived name, and the article source itself
//! is rewritten to point at the local copy.
//!
//! # Build Pipeline
//!
//! ```text
//! posts/**/*.md ─ discover ─┬─ article 1: localize → analyze → render → write ─┐
//!                           ├─ article 2: localize → analyze → render → write ─┼─ index.html
//!                           └─ article N: …                                    ─┘  components
//! ```
//!
//! Articles run as independent sub-pipelines on the rayon pool. One failing
//! article is reported and skipped; it never stops its siblings. The index
//! page and component registry are built after every sub-pipeline finished.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`discover`] | Walks the posts tree for article files |
//! | [`localize`] | Downloads remote images into the content-addressed store and rewrites sources |
//! | [`fetch`] | The network seam: [`fetch::Fetcher`] trait and the blocking HTTP implementation |
//! | [`analyze`] | Front matter parsing: title, date, author, tags, slug |
//! | [`render`] | Markdown to HTML, extracting embeddable components |
//! | [`template`] | The shared page template and its view slots |
//! | [`index`] | Index ordering and the index page view |
//! | [`components`] | Component files and the plugin registration file |
//! | [`write`] | Change-detecting and atomic file writes |
//! | [`pipeline`] | Orchestrates a full build |
//! | [`config`] | `postsmith.toml` loading and validation |
//! | [`types`] | Types shared between stages |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Addressed Images
//!
//! A stored image is named after the SHA-256 of its bytes plus the extension
//! its magic number implies. Two URLs serving the same bytes share one file,
//! and concurrent writers of the same asset can't corrupt each other: the
//! first rename wins and the rest find identical content already in place.
//!
//! ## Incremental Writes
//!
//! Pages, sources and components are only written when their bytes differ
//! from what is on disk, so a rebuild of an unchanged tree touches nothing
//! and file watchers stay quiet.

pub mod analyze;
pub mod components;
pub mod config;
pub mod discover;
pub mod fetch;
pub mod index;
pub mod localize;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod template;
pub mod types;
pub mod write;

#[cfg(test)]
pub(crate) mod test_helpers;
