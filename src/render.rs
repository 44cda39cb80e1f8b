//! Markdown to HTML conversion.
//!
//! Uses pulldown-cmark with tables, footnotes and strikethrough enabled.
//! Fenced blocks tagged with the component language and a name
//! (```` ```vue Counter ````) are lifted out of the page: their source is
//! returned as a [`Component`] and the HTML gets `<Counter></Counter>` in
//! their place, for the client-side bundle to mount.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html as md_html};

/// An embeddable component extracted from an article body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedMarkdown {
    pub html: String,
    pub components: Vec<Component>,
}

pub fn render_markdown(markdown: &str, component_lang: &str) -> RenderedMarkdown {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;

    let mut events = Vec::new();
    let mut components = Vec::new();
    let mut capture: Option<Component> = None;

    for event in Parser::new_ext(markdown, options) {
        match (capture.take(), event) {
            (Some(mut component), Event::Text(text)) => {
                component.source.push_str(&text);
                capture = Some(component);
            }
            (Some(component), Event::End(TagEnd::CodeBlock)) => {
                events.push(Event::Html(
                    format!("<{0}></{0}>\n", component.name).into(),
                ));
                components.push(component);
            }
            (Some(component), _) => capture = Some(component),
            (None, Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))) => {
                match component_name(&info, component_lang) {
                    Some(name) => {
                        capture = Some(Component {
                            name,
                            source: String::new(),
                        })
                    }
                    None => events.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))),
                }
            }
            (None, event) => events.push(event),
        }
    }

    let mut html = String::new();
    md_html::push_html(&mut html, events.into_iter());
    RenderedMarkdown { html, components }
}

/// `"vue Counter"` → `Some("Counter")` when `lang` is `vue`.
fn component_name(info: &str, lang: &str) -> Option<String> {
    let mut words = info.split_whitespace();
    if words.next()? != lang {
        return None;
    }
    let name = words.next()?;
    if words.next().is_some() || !is_component_name(name) {
        return None;
    }
    Some(name.to_string())
}

pub fn is_component_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
