//! Index aggregation.
//!
//! The index page lists every dated article, newest first. Undated articles
//! still get their own page but never appear here.
//!
//! Ordering is total so the index is byte-stable across builds regardless
//! of the order in which parallel sub-pipelines finished:
//!
//! 1. date, descending
//! 2. title, ascending (byte-wise)
//! 3. url path, ascending (two articles can share a title and a date, but
//!    never a url path)

use crate::template::{Slot, View};
use crate::types::ArticleSummary;
use std::cmp::Ordering;

/// Keep dated summaries and sort them for the index.
pub fn order_summaries(summaries: impl IntoIterator<Item = ArticleSummary>) -> Vec<ArticleSummary> {
    let mut dated: Vec<ArticleSummary> = summaries
        .into_iter()
        .filter(|s| s.date.is_some())
        .collect();
    dated.sort_by(compare);
    dated
}

fn compare(a: &ArticleSummary, b: &ArticleSummary) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.url_path.cmp(&b.url_path))
}

/// View for the index page: ordered summaries as JSON, the site name as
/// title, everything article-specific undefined.
pub fn index_view(site_name: &str, ordered: &[ArticleSummary]) -> View {
    // Serializing plain strings and Options can't fail.
    let index = serde_json::to_value(ordered).unwrap_or_default();
    View {
        index: Slot::Json(index),
        title: Slot::json(site_name),
        title_string: Slot::Text(site_name.to_string()),
        date: Slot::Undefined,
        author: Slot::Undefined,
        tags: Slot::Undefined,
        article: Slot::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublishDate;

    fn summary(title: &str, date: Option<&str>) -> ArticleSummary {
        ArticleSummary {
            title: title.to_string(),
            date: date.map(|d| PublishDate::parse(d).unwrap()),
            author: None,
            tags: vec![],
            filename: title.to_lowercase(),
            url_path: format!("{}.html", title.to_lowercase()),
        }
    }

    fn titles(summaries: &[ArticleSummary]) -> Vec<&str> {
        summaries.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn date_desc_then_title_asc() {
        let ordered = order_summaries(vec![
            summary("B", Some("2024-01-01")),
            summary("A", Some("2024-01-01")),
            summary("C", Some("2023-12-31")),
        ]);
        assert_eq!(titles(&ordered), vec!["A", "B", "C"]);
    }

    #[test]
    fn undated_articles_are_dropped() {
        let ordered = order_summaries(vec![
            summary("Draft", None),
            summary("Post", Some("2024-02-02")),
        ]);
        assert_eq!(titles(&ordered), vec!["Post"]);
    }

    #[test]
    fn order_is_independent_of_input_order() {
        let items = vec![
            summary("Zeta", Some("2024-03-01")),
            summary("Alpha", Some("2024-03-01")),
            summary("Mid", Some("2024-03-01T12:00")),
            summary("Old", Some("2020-01-01")),
        ];
        let mut reversed = items.clone();
        reversed.reverse();

        let a = order_summaries(items);
        let b = order_summaries(reversed);
        assert_eq!(a, b);
        assert_eq!(titles(&a), vec!["Mid", "Alpha", "Zeta", "Old"]);
    }

    #[test]
    fn same_title_and_date_break_ties_on_url() {
        let mut first = summary("Same", Some("2024-01-01"));
        first.url_path = "b/same.html".into();
        let mut second = summary("Same", Some("2024-01-01"));
        second.url_path = "a/same.html".into();

        let ordered = order_summaries(vec![first, second]);
        assert_eq!(ordered[0].url_path, "a/same.html");
    }

    #[test]
    fn index_view_embeds_summaries() {
        let ordered = order_summaries(vec![summary("Post", Some("2024-02-02"))]);
        let view = index_view("My Blog", &ordered);

        assert_eq!(view.title, Slot::json("My Blog"));
        assert_eq!(view.article, Slot::Undefined);
        assert_eq!(view.date, Slot::Undefined);
        let rendered = view.index.render();
        assert_eq!(
            rendered,
            r#"[{"title":"Post","date":"2024-02-02","tags":[],"filename":"post","url_path":"post.html"}]"#
        );
    }
}
