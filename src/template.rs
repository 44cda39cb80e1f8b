//! Page templating.
//!
//! Article pages and the index page share one template. Tags use mustache
//! syntax:
//!
//! - `{{ name }}` inserts the slot value HTML-escaped
//! - `{{{ name }}}` inserts it verbatim
//!
//! Unknown names render as nothing. A slot that is deliberately unset
//! renders the literal `undefined` (not `null`, not empty), so scripts in the
//! template can tell "this page has no date" apart from a JSON value. That is
//! how one template serves both page kinds: the index page leaves `article`,
//! `date`, `author` and `tags` undefined, article pages leave `index`
//! undefined.

use maud::{DOCTYPE, PreEscaped, html};
use regex::{Captures, Regex};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{\s*([A-Za-z_]\w*)\s*\}\}\}|\{\{\s*([A-Za-z_]\w*)\s*\}\}")
        .expect("template tag pattern must compile")
});

/// Rendered value of the `undefined` sentinel.
pub const UNDEFINED: &str = "undefined";

/// One view slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Renders as the literal `undefined`.
    Undefined,
    /// Renders as compact JSON.
    Json(Value),
    /// Renders as the text itself.
    Text(String),
}

impl Slot {
    pub fn json(value: impl Into<Value>) -> Self {
        Self::Json(value.into())
    }

    pub fn render(&self) -> String {
        match self {
            Slot::Undefined => UNDEFINED.to_string(),
            Slot::Json(value) => value.to_string(),
            Slot::Text(text) => text.clone(),
        }
    }
}

/// Everything a page template can reference.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Ordered article summaries (index page only).
    pub index: Slot,
    /// Page title as a JSON string.
    pub title: Slot,
    /// Page title as plain text, for `<title>`.
    pub title_string: Slot,
    pub date: Slot,
    pub author: Slot,
    pub tags: Slot,
    /// Rendered article HTML.
    pub article: Slot,
}

impl View {
    pub fn get(&self, name: &str) -> Option<&Slot> {
        match name {
            "index" => Some(&self.index),
            "title" => Some(&self.title),
            "title_string" => Some(&self.title_string),
            "date" => Some(&self.date),
            "author" => Some(&self.author),
            "tags" => Some(&self.tags),
            "article" => Some(&self.article),
            _ => None,
        }
    }
}

pub fn render_template(template: &str, view: &View) -> String {
    TAG.replace_all(template, |caps: &Captures| {
        if let Some(raw) = caps.get(1) {
            view.get(raw.as_str()).map(Slot::render).unwrap_or_default()
        } else if let Some(escaped) = caps.get(2) {
            view.get(escaped.as_str())
                .map(|slot| escape_html(&slot.render()))
                .unwrap_or_default()
        } else {
            String::new()
        }
    })
    .into_owned()
}

fn escape_html(text: &str) -> String {
    html! { (text) }.into_string()
}

/// Read the template at `path`, or fall back to [`stock_template`] when the
/// file doesn't exist.
pub fn load_template(path: &Path) -> io::Result<String> {
    match fs::read_to_string(path) {
        Ok(template) => Ok(template),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "template not found, using built-in template");
            Ok(stock_template())
        }
        Err(e) => Err(e),
    }
}

/// Minimal built-in template: the article HTML in `<main>`, page data
/// exposed to scripts as `window.POST`, and a list of links rendered from
/// the index data on the index page.
pub fn stock_template() -> String {
    const DATA: &str = "window.POST = { index: {{{index}}}, title: {{{title}}}, \
                        date: {{{date}}}, author: {{{author}}}, tags: {{{tags}}} };";
    const INDEX: &str = r#"(function () {
  var post = window.POST;
  if (!post.index) return;
  var list = document.createElement("ul");
  post.index.forEach(function (entry) {
    var item = document.createElement("li");
    var link = document.createElement("a");
    link.href = entry.url_path;
    link.textContent = entry.title;
    item.appendChild(link);
    item.appendChild(document.createTextNode(" " + entry.date));
    list.appendChild(item);
  });
  document.querySelector("main").replaceChildren(list);
})();"#;

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "{{title_string}}" }
                script { (PreEscaped(DATA)) }
            }
            body {
                h1 { "{{title_string}}" }
                main { (PreEscaped("{{{article}}}")) }
                script { (PreEscaped(INDEX)) }
            }
        }
    }
    .into_string()
}
