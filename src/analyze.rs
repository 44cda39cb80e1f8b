//! Article header analysis.
//!
//! Splits an article's raw text into metadata and markdown body. Metadata
//! comes from optional TOML front matter fenced by `+++` lines:
//!
//! ```text
//! +++
//! title = "Pinning, explained"
//! date = 2024-01-31
//! author = "Ada"
//! tags = ["rust", "async"]
//! slug = "pinning"
//! +++
//!
//! Body starts here.
//! ```
//!
//! Every key is optional; unknown keys are rejected. When there is no
//! `title`, the first `# heading` of the body is used, then the filename
//! stem with dashes turned into spaces. `slug` overrides the output
//! filename, which otherwise is the stem.
//!
//! Analysis is pure: same input, same output, no I/O.

use crate::types::PublishDate;
use serde::Deserialize;
use thiserror::Error;

const FENCE: &str = "+++";

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("front matter opened with +++ but never closed")]
    Unterminated,
    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] toml::de::Error),
    #[error("invalid date {0:?}, expected YYYY-MM-DD with optional THH:MM[:SS]")]
    InvalidDate(String),
    #[error("invalid slug {0:?}, must be a non-empty name without path separators")]
    InvalidSlug(String),
}

/// An analyzed article: metadata plus the markdown body to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub date: Option<PublishDate>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    /// Output filename without extension.
    pub filename: String,
    pub markdown: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FrontMatter {
    title: Option<String>,
    date: Option<toml::Value>,
    author: Option<String>,
    tags: Vec<String>,
    slug: Option<String>,
}

pub fn analyze(raw: &str, stem: &str) -> Result<Article, AnalyzeError> {
    let (front, body) = split_front_matter(raw)?;
    let front: FrontMatter = match front {
        Some(block) => toml::from_str(block)?,
        None => FrontMatter::default(),
    };

    let date = front.date.map(parse_date).transpose()?;

    let filename = match front.slug {
        Some(slug) if valid_slug(&slug) => slug,
        Some(slug) => return Err(AnalyzeError::InvalidSlug(slug)),
        None => stem.to_string(),
    };

    let title = front
        .title
        .filter(|t| !t.trim().is_empty())
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| stem.replace('-', " "));

    Ok(Article {
        title,
        date,
        author: front.author.filter(|a| !a.trim().is_empty()),
        tags: front.tags,
        filename,
        markdown: body.to_string(),
    })
}

/// Split `+++`-fenced front matter from the body.
fn split_front_matter(raw: &str) -> Result<(Option<&str>, &str), AnalyzeError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(first_line_end) = raw.find('\n') else {
        return Ok((None, raw));
    };
    if raw[..first_line_end].trim_end() != FENCE {
        return Ok((None, raw));
    }

    let rest = &raw[first_line_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let front = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(front), body.trim_start_matches(['\r', '\n'])));
        }
        offset += line.len();
    }
    Err(AnalyzeError::Unterminated)
}

fn parse_date(value: toml::Value) -> Result<PublishDate, AnalyzeError> {
    let raw = match value {
        toml::Value::String(s) => s,
        toml::Value::Datetime(dt) => dt.to_string(),
        other => other.to_string(),
    };
    PublishDate::parse(&raw).ok_or(AnalyzeError::InvalidDate(raw))
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches("# ").trim().to_string())
        .filter(|t| !t.is_empty())
}

fn valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug != "." && slug != ".." && !slug.contains(['/', '\\'])
}
