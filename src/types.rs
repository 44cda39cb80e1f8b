//! Shared types passed between pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One article as read from the posts tree.
///
/// Owned by exactly one sub-pipeline; the localizer may replace `raw_text`
/// and persist it back to `relative_path` under the posts root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSource {
    /// Path relative to the posts root, e.g. `rust/ownership.md`.
    pub relative_path: PathBuf,
    pub raw_text: String,
}

impl ArticleSource {
    /// Number of path separators in the relative path.
    ///
    /// `a.md` → 0, `a/b/c.md` → 2. Used to climb back to the posts root
    /// from the article's own directory.
    pub fn depth(&self) -> usize {
        self.relative_path.components().count().saturating_sub(1)
    }

    /// Directory of the article relative to the posts root (empty at top level).
    pub fn dir(&self) -> &Path {
        self.relative_path.parent().unwrap_or(Path::new(""))
    }

    /// Filename without its extension.
    pub fn stem(&self) -> String {
        self.relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// A publish date in `YYYY-MM-DD[THH:MM[:SS]]` form.
///
/// The format is fixed-width, so lexicographic order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishDate(String);

impl PublishDate {
    /// Parse a date, normalizing a space separator to `T`.
    ///
    /// Fractional seconds and a UTC offset (`Z`, `+02:00`) after a full
    /// `HH:MM:SS` are accepted and dropped; the wall-clock time is kept.
    /// Returns `None` for anything that isn't in the accepted form.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let bytes = raw.as_bytes();
        let digits = |range: std::ops::Range<usize>| {
            bytes
                .get(range)
                .is_some_and(|s| s.iter().all(u8::is_ascii_digit))
        };
        let valid_date = bytes.len() >= 10
            && digits(0..4)
            && bytes[4] == b'-'
            && digits(5..7)
            && bytes[7] == b'-'
            && digits(8..10);
        if !valid_date {
            return None;
        }
        let month: u32 = raw[5..7].parse().ok()?;
        let day: u32 = raw[8..10].parse().ok()?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        let time = match raw.get(10..) {
            Some(t) if t.len() > 9 && t.is_char_boundary(9) && is_time_suffix(&t[9..]) => &t[..9],
            Some(t) => t,
            None => return None,
        };
        if time.is_empty() {
            return Some(Self(raw.to_string()));
        }
        let tb = time.as_bytes();
        let valid_time = (tb[0] == b'T' || tb[0] == b' ')
            && (tb.len() == 6 || tb.len() == 9)
            && digits(11..13)
            && tb[3] == b':'
            && digits(14..16)
            && (tb.len() == 6 || (tb[6] == b':' && digits(17..19)));
        if !valid_time {
            return None;
        }
        Some(Self(format!("{}T{}", &raw[..10], &time[1..])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `.123`, `Z`, `+02:00`, or a fraction followed by an offset.
fn is_time_suffix(s: &str) -> bool {
    let s = match s.strip_prefix('.') {
        Some(fraction) => {
            let end = fraction
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(fraction.len());
            if end == 0 {
                return false;
            }
            &fraction[end..]
        }
        None => s,
    };
    let b = s.as_bytes();
    s.is_empty()
        || s.eq_ignore_ascii_case("z")
        || (b.len() == 6
            && matches!(b[0], b'+' | b'-')
            && b[1..3].iter().all(u8::is_ascii_digit)
            && b[3] == b':'
            && b[4..6].iter().all(u8::is_ascii_digit))
}

impl fmt::Display for PublishDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index entry derived from an analyzed article.
///
/// Serialized as-is into the index page for client-side use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<PublishDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Output filename without `.html`.
    pub filename: String,
    /// Site-relative page path, always `/`-separated.
    pub url_path: String,
}

/// Join an article directory and analyzed filename into a site URL path.
///
/// `("rust/basics", "ownership")` → `rust/basics/ownership.html`.
pub fn url_path(dir: &Path, filename: &str) -> String {
    let mut parts: Vec<String> = dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.push(format!("{filename}.html"));
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &str) -> ArticleSource {
        ArticleSource {
            relative_path: PathBuf::from(path),
            raw_text: String::new(),
        }
    }

    #[test]
    fn depth_counts_separators() {
        assert_eq!(source("a.md").depth(), 0);
        assert_eq!(source("a/b.md").depth(), 1);
        assert_eq!(source("a/b/c.md").depth(), 2);
    }

    #[test]
    fn dir_and_stem() {
        let s = source("rust/basics/ownership.md");
        assert_eq!(s.dir(), Path::new("rust/basics"));
        assert_eq!(s.stem(), "ownership");
        assert_eq!(source("top.md").dir(), Path::new(""));
    }

    #[test]
    fn url_path_uses_forward_slashes() {
        assert_eq!(url_path(Path::new(""), "hello"), "hello.html");
        assert_eq!(
            url_path(Path::new("rust/basics"), "ownership"),
            "rust/basics/ownership.html"
        );
    }

    // =========================================================================
    // PublishDate
    // =========================================================================

    #[test]
    fn date_accepts_plain_day() {
        assert_eq!(
            PublishDate::parse("2024-01-31").unwrap().as_str(),
            "2024-01-31"
        );
    }

    #[test]
    fn date_normalizes_space_separator() {
        assert_eq!(
            PublishDate::parse("2024-01-31 08:15").unwrap().as_str(),
            "2024-01-31T08:15"
        );
        assert_eq!(
            PublishDate::parse("2024-01-31T08:15:09").unwrap().as_str(),
            "2024-01-31T08:15:09"
        );
    }

    #[test]
    fn date_drops_offset_and_fraction() {
        for raw in [
            "2024-01-31T08:15:00Z",
            "2024-01-31T08:15:00.5",
            "2024-01-31T08:15:00+02:00",
            "2024-01-31 08:15:00.123-05:30",
        ] {
            assert_eq!(
                PublishDate::parse(raw).map(|d| d.to_string()).as_deref(),
                Some("2024-01-31T08:15:00"),
                "{raw}"
            );
        }
        assert!(PublishDate::parse("2024-01-31T08:15:00.").is_none());
        assert!(PublishDate::parse("2024-01-31T08:15:00+2").is_none());
    }

    #[test]
    fn date_rejects_malformed() {
        assert!(PublishDate::parse("31/01/2024").is_none());
        assert!(PublishDate::parse("2024-13-01").is_none());
        assert!(PublishDate::parse("2024-01-01X").is_none());
        assert!(PublishDate::parse("2024-01-01T8:15").is_none());
        assert!(PublishDate::parse("").is_none());
    }

    #[test]
    fn dates_order_chronologically() {
        let a = PublishDate::parse("2023-12-31").unwrap();
        let b = PublishDate::parse("2024-01-01").unwrap();
        let c = PublishDate::parse("2024-01-01T09:00").unwrap();
        assert!(a < b);
        assert!(b < c);
    }
}
