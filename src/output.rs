//! CLI output formatting for a build.
//!
//! Output leads with what each article *is* (its title and where its page
//! went) and shows the source path and downloaded images as indented context:
//!
//! ```text
//! Articles
//! 001 Pinning, explained → rust/pinning.html (written)
//!     Source: rust/pinning.md
//!     Images: 2 (1 new)
//! 002 Draft → draft.html (unchanged)
//!     Source: draft.md
//!
//! Index → index.html (1 article, written)
//! Images → images/ (1 copied)
//!
//! Components
//!     Counter (rust/pinning.md)
//!
//! Failed
//!     broken.md [localizing]: download failed for https://…: HTTP 404
//!
//! Built 3 articles: 1 written, 1 unchanged, 1 failed
//! ```
//!
//! [`format_build_output`] is pure and returns lines for testability;
//! [`print_build_output`] writes them to stdout.

use crate::pipeline::{BuildReport, INDEX_PAGE};
use crate::write::WriteOutcome;

// ============================================================================
// Helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn outcome_label(outcome: WriteOutcome) -> &'static str {
    match outcome {
        WriteOutcome::Written => "written",
        WriteOutcome::Unchanged => "unchanged",
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Build output
// ============================================================================

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.articles.is_empty() {
        lines.push("Articles".to_string());
        for (i, article) in report.articles.iter().enumerate() {
            lines.push(format!(
                "{} {} → {} ({})",
                format_index(i + 1),
                article.summary.title,
                article.summary.url_path,
                outcome_label(article.outcome)
            ));
            lines.push(format!("    Source: {}", article.path.display()));
            if article.assets > 0 {
                lines.push(format!(
                    "    Images: {} ({} new)",
                    article.assets, article.assets_created
                ));
            }
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "Index → {} ({}, {})",
        INDEX_PAGE,
        plural(report.indexed, "article"),
        outcome_label(report.index_outcome)
    ));

    if report.mirrored_assets > 0 {
        lines.push(format!(
            "Images → images/ ({} copied)",
            report.mirrored_assets
        ));
    }

    if !report.components.is_empty() {
        lines.push(String::new());
        lines.push("Components".to_string());
        for (name, owner) in &report.components {
            lines.push(format!("    {} ({})", name, owner.display()));
        }
    }

    lines.extend(format_failures(report));

    if !report.skipped_dirs.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for (path, reason) in &report.skipped_dirs {
            lines.push(format!("    {}: {}", path.display(), reason));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Built {}: {} written, {} unchanged, {} failed",
        plural(report.articles.len() + report.failures.len(), "article"),
        report.written(),
        report.unchanged(),
        report.failures.len()
    ));
    lines
}

/// Lines for failed articles, empty when there are none.
pub fn format_failures(report: &BuildReport) -> Vec<String> {
    if report.failures.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![String::new(), "Failed".to_string()];
    lines.extend(report.failures.iter().map(|f| format!("    {f}")));
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
