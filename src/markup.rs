//! Markdown rendering.
//!
//! The pipeline only depends on the [`MarkupRenderer`] trait, so the renderer
//! can be swapped (or mocked in tests) without touching the worker. The
//! production implementation is [`CmarkRenderer`], backed by `pulldown-cmark`.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("renderer failed: {0}")]
    Failed(String),
    #[error("renderer panicked: {0}")]
    Panicked(String),
}

/// Markdown syntax extensions, named as in `m2h.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkdownExtension {
    Tables,
    Footnotes,
    Strikethrough,
    Tasklists,
    DefinitionList,
    SmartPunctuation,
    HeadingAttributes,
    /// Treat every newline inside a paragraph as a line break.
    HardBreaks,
}

/// Renders markdown source into an HTML fragment.
///
/// Implementations are shared by all workers, hence `Sync`.
pub trait MarkupRenderer: Sync {
    fn render(&self, source: &str, extensions: &[MarkdownExtension]) -> Result<String, RenderError>;
}

/// `pulldown-cmark` renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmarkRenderer;

fn parser_options(extensions: &[MarkdownExtension]) -> Options {
    let mut options = Options::empty();
    for ext in extensions {
        options.insert(match ext {
            MarkdownExtension::Tables => Options::ENABLE_TABLES,
            MarkdownExtension::Footnotes => Options::ENABLE_FOOTNOTES,
            MarkdownExtension::Strikethrough => Options::ENABLE_STRIKETHROUGH,
            MarkdownExtension::Tasklists => Options::ENABLE_TASKLISTS,
            MarkdownExtension::DefinitionList => Options::ENABLE_DEFINITION_LIST,
            MarkdownExtension::SmartPunctuation => Options::ENABLE_SMART_PUNCTUATION,
            MarkdownExtension::HeadingAttributes => Options::ENABLE_HEADING_ATTRIBUTES,
            MarkdownExtension::HardBreaks => continue,
        });
    }
    options
}

impl MarkupRenderer for CmarkRenderer {
    fn render(
        &self,
        source: &str,
        extensions: &[MarkdownExtension],
    ) -> Result<String, RenderError> {
        let hard_breaks = extensions.contains(&MarkdownExtension::HardBreaks);
        let parser = Parser::new_ext(source, parser_options(extensions)).map(|event| match event {
            Event::SoftBreak if hard_breaks => Event::HardBreak,
            other => other,
        });
        let mut fragment = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut fragment, parser);
        Ok(fragment)
    }
}

/// Run a renderer, turning a panic into a [`RenderError`].
pub fn render_guarded(
    renderer: &dyn MarkupRenderer,
    source: &str,
    extensions: &[MarkdownExtension],
) -> Result<String, RenderError> {
    panic::catch_unwind(AssertUnwindSafe(|| renderer.render(source, extensions))).unwrap_or_else(
        |payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(RenderError::Panicked(message))
        },
    )
}

/// Document title: text of the first level-one heading, else the file stem.
pub fn resolve_title(source: &str, path: &Path) -> String {
    let mut heading: Option<String> = None;
    for event in Parser::new(source) {
        match event {
            Event::Start(Tag::Heading { level: HeadingLevel::H1, .. }) => {
                heading = Some(String::new());
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = heading.as_mut() {
                    title.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(title) = heading.as_mut() {
                    title.push(' ');
                }
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                if let Some(title) = heading.take() {
                    let title = title.trim();
                    if !title.is_empty() {
                        return title.to_string();
                    }
                }
            }
            _ => {}
        }
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkdownConfig;

    fn render(source: &str) -> String {
        CmarkRenderer
            .render(source, &MarkdownConfig::default().extensions)
            .unwrap()
    }

    #[test]
    fn renders_basic_markdown() {
        let html = render("# 見出し\n\nThis is **bold** and *italic*.");
        assert!(html.contains("<h1>見出し</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
    }

    #[test]
    fn tables_enabled_by_default() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn tables_disabled_without_extension() {
        let html = CmarkRenderer
            .render("| a | b |\n|---|---|\n| 1 | 2 |\n", &[])
            .unwrap();
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn hard_breaks_turn_newlines_into_br() {
        let html = render("一行目\n二行目");
        assert!(html.contains("<br />"));

        let soft = CmarkRenderer.render("一行目\n二行目", &[]).unwrap();
        assert!(!soft.contains("<br"));
    }

    #[test]
    fn footnotes_enabled_by_default() {
        let html = render("Text[^1]\n\n[^1]: Note\n");
        assert!(html.contains("footnote"));
    }

    #[test]
    fn image_alt_keeps_annotation_text() {
        let html = render("![Chart {: size-small}](chart.png)");
        assert!(html.contains(r#"src="chart.png""#));
        assert!(html.contains("{: size-small}"));
    }

    struct PanickingRenderer;

    impl MarkupRenderer for PanickingRenderer {
        fn render(&self, _: &str, _: &[MarkdownExtension]) -> Result<String, RenderError> {
            panic!("boom");
        }
    }

    #[test]
    fn render_guarded_catches_panics() {
        let err = render_guarded(&PanickingRenderer, "x", &[]).unwrap_err();
        assert!(matches!(err, RenderError::Panicked(ref m) if m == "boom"));
    }

    #[test]
    fn resolve_title_prefers_heading() {
        let title = resolve_title("intro\n# Title #\n## Sub", Path::new("docs/a.md"));
        assert_eq!(title, "Title");
    }

    #[test]
    fn resolve_title_ignores_fenced_code() {
        let source = "```sh\n# install deps\nnpm i\n```\n\n# Real Title\n";
        assert_eq!(resolve_title(source, Path::new("guide.md")), "Real Title");
    }

    #[test]
    fn resolve_title_keeps_trailing_hash_in_words() {
        assert_eq!(resolve_title("# Learning C#\n", Path::new("c.md")), "Learning C#");
    }

    #[test]
    fn resolve_title_flattens_inline_markup() {
        let title = resolve_title("Intro\n\n# The `m2h` *guide*\n", Path::new("a.md"));
        assert_eq!(title, "The m2h guide");
    }

    #[test]
    fn resolve_title_accepts_setext_heading() {
        assert_eq!(resolve_title("見出し\n===\n\n本文\n", Path::new("a.md")), "見出し");
    }

    #[test]
    fn resolve_title_falls_back_to_stem() {
        assert_eq!(resolve_title("## only h2", Path::new("docs/setup-guide.md")), "setup-guide");
        assert_eq!(resolve_title("#\n", Path::new("x.md")), "x");
    }
}
