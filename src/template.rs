//! Final HTML document assembly.
//!
//! Takes the fragment produced by the markup renderer plus the per-image
//! classifications and wraps them in a self-contained, print-ready page.
//!
//! ## Stylesheet Order
//!
//! The single `<style>` element is assembled in this order, so later rules
//! override earlier ones by source order:
//!
//! ```text
//! 1. color variables       light on :root, dark on [data-theme="dark"]
//! 2. font variable         --font-family from the configured preference list
//! 3. @page                 size and margin from [print]
//! 4. static/style.css      base typography, image classes, print rules
//! 5. custom stylesheet     verbatim, if configured
//! ```
//!
//! ## Fragment Safety
//!
//! Before embedding, [`check_fragment`] does a best-effort structural scan of
//! the fragment: block elements must be closed in order, comments must end,
//! and document-level tags (`html`, `head`, `body`) are refused. Raw HTML in
//! the markdown source is the usual culprit. This is not a sanitizer.
//!
//! ## HTML Generation
//!
//! The page shell is built with [maud](https://maud.lambda.xyz/); the fragment,
//! stylesheet and script are inserted pre-escaped, everything else (title,
//! attributes) is escaped by maud.

use crate::classify::{Classification, strip_annotations};
use crate::config::{self, ColorConfig, Config, PrintConfig};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated <{tag}> element")]
    Unterminated { tag: String },
    #[error("closing </{tag}> has no matching opening element")]
    UnexpectedClose { tag: String },
    #[error("</{found}> closes an open <{expected}>")]
    Mismatched { expected: String, found: String },
    #[error("fragment contains a document-level <{tag}> element")]
    DocumentLevel { tag: String },
    #[error("unterminated HTML comment")]
    UnterminatedComment,
}

const CSS_STATIC: &str = include_str!("../static/style.css");
const THEME_JS: &str = include_str!("../static/theme.js");
const PRINT_ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M19 8H5c-1.66 0-3 1.34-3 3v6h4v4h12v-4h4v-6c0-1.66-1.34-3-3-3zm-3 11H8v-5h8v5zm3-7c-.55 0-1-.45-1-1s.45-1 1-1 1 .45 1 1-.45 1-1 1zm-1-9H6v4h12V3z"/></svg>"#;

/// Block elements whose nesting is checked.
const STRUCTURAL: &[&str] = &[
    "article", "aside", "blockquote", "details", "div", "figure", "footer", "header", "main", "nav",
    "ol", "pre", "script", "section", "style", "table", "tbody", "tfoot", "thead", "tr", "ul",
];
const DOCUMENT_LEVEL: &[&str] = &["html", "head", "body"];

/// An image reference found in a fragment, with attribute entities decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
}

/// Everything needed to produce one output document.
///
/// Built by a single worker and dropped once the page is written.
#[derive(Debug)]
pub struct RenderedDocument<'a> {
    pub title: String,
    pub fragment: String,
    pub dark_mode: bool,
    pub font_family: String,
    pub custom_css: Option<&'a str>,
    pub lang: &'a str,
    pub colors: &'a ColorConfig,
    pub print: &'a PrintConfig,
    pub images: HashMap<ImageRef, Classification>,
}

impl<'a> RenderedDocument<'a> {
    pub fn new(
        config: &'a Config,
        title: String,
        fragment: String,
        images: HashMap<ImageRef, Classification>,
    ) -> Self {
        Self {
            title,
            fragment,
            dark_mode: config.dark_mode,
            font_family: config.font_family(),
            custom_css: config.custom_css.as_ref().map(|c| c.content.as_str()),
            lang: &config.lang,
            colors: &config.colors,
            print: &config.print,
            images,
        }
    }
}

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img\b([^>]*)>").expect("img regex is valid"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute regex is valid")
});

/// Tag attributes in source order; values are kept entity-encoded.
fn parse_attributes(inner: &str) -> Vec<(String, Option<String>)> {
    ATTRIBUTE
        .captures_iter(inner)
        .map(|cap| {
            let name = cap[1].to_ascii_lowercase();
            let value = cap
                .get(2)
                .map(|m| m.as_str().to_string())
                .or_else(|| cap.get(3).map(|m| m.as_str().replace('"', "&quot;")))
                .or_else(|| cap.get(4).map(|m| m.as_str().to_string()));
            (name, value)
        })
        .collect()
}

fn attribute<'v>(attrs: &'v [(String, Option<String>)], name: &str) -> &'v str {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, v)| v.as_deref())
        .unwrap_or("")
}

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|(quot|apos|lt|gt|amp));")
        .expect("entity regex is valid")
});

/// Single pass, so `&amp;lt;` decodes to `&lt;` and not `<`.
fn decode_entities(value: &str) -> String {
    ENTITY
        .replace_all(value, |caps: &regex::Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                match &caps[3] {
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    _ => Some('&'),
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn inner_attributes(tag_inner: &str) -> &str {
    tag_inner.trim_end().trim_end_matches('/')
}

/// Unique image references in order of first appearance.
pub fn scan_images(fragment: &str) -> Vec<ImageRef> {
    let mut seen = HashSet::new();
    IMG_TAG
        .captures_iter(fragment)
        .map(|cap| {
            let attrs = parse_attributes(inner_attributes(&cap[1]));
            ImageRef {
                src: decode_entities(attribute(&attrs, "src")),
                alt: decode_entities(attribute(&attrs, "alt")),
            }
        })
        .filter(|image| seen.insert(image.clone()))
        .collect()
}

/// Rewrite every `<img>` with its classification classes and a cleaned alt.
///
/// Existing classes are kept; the class list is sorted and de-duplicated.
/// Returns the new fragment and the number of image tags rewritten.
pub fn rewrite_images(
    fragment: &str,
    images: &HashMap<ImageRef, Classification>,
) -> (String, usize) {
    let mut count = 0;
    let rewritten = IMG_TAG.replace_all(fragment, |cap: &regex::Captures| {
        count += 1;
        let mut attrs = parse_attributes(inner_attributes(&cap[1]));
        let key = ImageRef {
            src: decode_entities(attribute(&attrs, "src")),
            alt: decode_entities(attribute(&attrs, "alt")),
        };

        let mut classes: BTreeSet<String> = attribute(&attrs, "class")
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if let Some(classification) = images.get(&key) {
            classes.extend(classification.css_classes().into_iter().map(str::to_string));
        }
        let class_value = classes.into_iter().collect::<Vec<_>>().join(" ");

        for (name, value) in attrs.iter_mut() {
            if *name == "alt" {
                *value = Some(strip_annotations(value.as_deref().unwrap_or("")));
            }
        }
        match attrs.iter().position(|(name, _)| name == "class") {
            Some(pos) => attrs[pos].1 = Some(class_value),
            None if !class_value.is_empty() => {
                attrs.push(("class".to_string(), Some(class_value)))
            }
            None => {}
        }

        let mut tag = String::from("<img");
        for (name, value) in &attrs {
            tag.push(' ');
            tag.push_str(name);
            if let Some(value) = value {
                tag.push_str("=\"");
                tag.push_str(value);
                tag.push('"');
            }
        }
        tag.push_str(" />");
        tag
    });
    (rewritten.into_owned(), count)
}

/// Best-effort structural check of a fragment before embedding it.
pub fn check_fragment(fragment: &str) -> Result<(), TemplateError> {
    let mut stack: Vec<String> = Vec::new();
    let mut rest = fragment;

    while let Some(pos) = rest.find('<') {
        rest = &rest[pos + 1..];

        if let Some(after) = rest.strip_prefix("!--") {
            match after.find("-->") {
                Some(end) => {
                    rest = &after[end + 3..];
                    continue;
                }
                None => return Err(TemplateError::UnterminatedComment),
            }
        }

        let (closing, body) = match rest.strip_prefix('/') {
            Some(body) => (true, body),
            None => (false, rest),
        };
        if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }
        let name: String = body
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let Some(end) = body.find('>') else {
            return Err(TemplateError::Unterminated { tag: name });
        };
        let self_closing = body[..end].ends_with('/');
        rest = &body[end + 1..];

        if DOCUMENT_LEVEL.contains(&name.as_str()) {
            return Err(TemplateError::DocumentLevel { tag: name });
        }
        if !STRUCTURAL.contains(&name.as_str()) || self_closing {
            continue;
        }

        if closing {
            match stack.pop() {
                Some(open) if open == name => {}
                Some(open) => {
                    return Err(TemplateError::Mismatched {
                        expected: open,
                        found: name,
                    });
                }
                None => return Err(TemplateError::UnexpectedClose { tag: name }),
            }
        } else if name == "script" || name == "style" {
            // Raw text: skip straight to the closing tag.
            let close = format!("</{name}");
            match rest.to_ascii_lowercase().find(&close) {
                Some(at) => rest = &rest[at..],
                None => return Err(TemplateError::Unterminated { tag: name }),
            }
            stack.push(name);
        } else {
            stack.push(name);
        }
    }

    match stack.pop() {
        Some(tag) => Err(TemplateError::Unterminated { tag }),
        None => Ok(()),
    }
}

/// Assemble the complete stylesheet in override order.
pub fn build_stylesheet(doc: &RenderedDocument) -> String {
    let mut css = [
        config::generate_color_css(doc.colors),
        config::generate_font_css(&doc.font_family),
        config::generate_page_css(doc.print),
        CSS_STATIC.to_string(),
    ]
    .join("\n\n");
    if let Some(custom) = doc.custom_css {
        css.push_str("\n\n/* custom stylesheet */\n");
        css.push_str(custom);
    }
    css
}

/// Produce the final HTML document.
///
/// Returns the page and the number of images it contains.
pub fn render_document(doc: &RenderedDocument) -> Result<(String, usize), TemplateError> {
    check_fragment(&doc.fragment)?;
    let (body, image_count) = rewrite_images(&doc.fragment, &doc.images);
    let css = build_stylesheet(doc);
    let page = base_document(doc, &css, &body);
    Ok((page.into_string(), image_count))
}

/// Renders the page shell around an already-rewritten fragment.
fn base_document(doc: &RenderedDocument, css: &str, body: &str) -> Markup {
    let theme = if doc.dark_mode { "dark" } else { "light" };
    html! {
        (DOCTYPE)
        html lang=(doc.lang) data-theme=(theme) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (doc.title) }
                style { (PreEscaped(css)) }
            }
            body {
                div.utility-buttons {
                    button.utility-button type="button" onclick="window.print()" aria-label="印刷" {
                        (PreEscaped(PRINT_ICON))
                    }
                    button.utility-button type="button" onclick="toggleTheme()" aria-label="テーマ切り替え" {
                        "🌓"
                    }
                }
                main.document {
                    (PreEscaped(body))
                }
                script { (PreEscaped(THEME_JS)) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ImageKind, ImageSize};

    fn classification(kind: ImageKind, size: Option<ImageSize>) -> Classification {
        Classification {
            kind,
            size,
            rule: None,
            conflict: None,
        }
    }

    fn document<'a>(
        colors: &'a ColorConfig,
        print: &'a PrintConfig,
        fragment: &str,
    ) -> RenderedDocument<'a> {
        RenderedDocument {
            title: "テスト".to_string(),
            fragment: fragment.to_string(),
            dark_mode: false,
            font_family: config::font_family(&["Noto Sans JP".to_string()]),
            custom_css: None,
            lang: "ja",
            colors,
            print,
            images: HashMap::new(),
        }
    }

    // =========================================================================
    // Image scanning and rewriting
    // =========================================================================

    #[test]
    fn scan_images_dedupes_in_order() {
        let fragment = concat!(
            r#"<p><img src="b.png" alt="B" /><img src="a.png" alt="A" />"#,
            r#"<img src="b.png" alt="B" /></p>"#,
        );
        let images = scan_images(fragment);
        assert_eq!(
            images,
            vec![
                ImageRef { src: "b.png".into(), alt: "B".into() },
                ImageRef { src: "a.png".into(), alt: "A".into() },
            ]
        );
    }

    #[test]
    fn scan_images_decodes_entities() {
        let images = scan_images(r#"<img src="x.png?a=1&amp;b=2" alt="&quot;q&quot;" />"#);
        assert_eq!(images[0].src, "x.png?a=1&b=2");
        assert_eq!(images[0].alt, "\"q\"");
    }

    #[test]
    fn scan_images_decodes_numeric_entities() {
        let images = scan_images(r#"<img src="it&#x27;s.png" alt="Bob&#39;s &#x22;pic&#34;" />"#);
        assert_eq!(images[0].src, "it's.png");
        assert_eq!(images[0].alt, "Bob's \"pic\"");

        let images = scan_images(r#"<img src="a&amp;lt;b.png" alt="&#xD800;" />"#);
        assert_eq!(images[0].src, "a&lt;b.png");
        assert_eq!(images[0].alt, "&#xD800;");
    }

    #[test]
    fn rewrite_matches_numeric_entity_references() {
        let fragment = r#"<img src="it&#x27;s.png" alt="Bob&#x27;s" />"#;
        let mut images = HashMap::new();
        images.insert(
            ImageRef { src: "it's.png".into(), alt: "Bob's".into() },
            classification(ImageKind::Plain, Some(ImageSize::Small)),
        );
        let (html, count) = rewrite_images(fragment, &images);
        assert_eq!(count, 1);
        assert!(html.contains("img-small"));
    }

    #[test]
    fn rewrite_adds_classes_and_strips_annotation() {
        let fragment = r#"<p><img src="chart.png" alt="Chart {: size-small}" /></p>"#;
        let mut images = HashMap::new();
        images.insert(
            ImageRef { src: "chart.png".into(), alt: "Chart {: size-small}".into() },
            classification(ImageKind::Plain, Some(ImageSize::Small)),
        );
        let (html, count) = rewrite_images(fragment, &images);
        assert_eq!(count, 1);
        assert_eq!(
            html,
            r#"<p><img src="chart.png" alt="Chart" class="content-image img-small" /></p>"#
        );
    }

    #[test]
    fn rewrite_merges_existing_classes() {
        let fragment = r#"<img class="zoom badge" src='ci.svg' title="CI">"#;
        let mut images = HashMap::new();
        images.insert(
            ImageRef { src: "ci.svg".into(), alt: String::new() },
            classification(ImageKind::Badge, None),
        );
        let (html, _) = rewrite_images(fragment, &images);
        assert_eq!(html, r#"<img class="badge zoom" src="ci.svg" title="CI" />"#);
    }

    #[test]
    fn rewrite_leaves_unknown_images_unclassified() {
        let (html, count) = rewrite_images(r#"<img src="x.png" alt="x" />"#, &HashMap::new());
        assert_eq!(count, 1);
        assert_eq!(html, r#"<img src="x.png" alt="x" />"#);
    }

    // =========================================================================
    // Fragment checks
    // =========================================================================

    #[test]
    fn balanced_fragment_passes() {
        let fragment = concat!(
            "<h1>T</h1>\n<div class=\"x\"><ul><li>a<li>b</ul></div><br /><hr>\n",
            "<pre><code>&lt;div&gt;</code></pre>",
        );
        assert_eq!(check_fragment(fragment), Ok(()));
    }

    #[test]
    fn unterminated_div_detected() {
        let err = check_fragment("<div class=\"note\">\n<p>hello</p>").unwrap_err();
        assert_eq!(err, TemplateError::Unterminated { tag: "div".into() });
    }

    #[test]
    fn stray_close_detected() {
        let err = check_fragment("<p>a</p></section>").unwrap_err();
        assert_eq!(err, TemplateError::UnexpectedClose { tag: "section".into() });
    }

    #[test]
    fn mismatched_close_detected() {
        let err = check_fragment("<div><table></div></table>").unwrap_err();
        assert!(matches!(err, TemplateError::Mismatched { .. }));
    }

    #[test]
    fn document_level_tags_refused() {
        let err = check_fragment("<p>x</p></body>").unwrap_err();
        assert_eq!(err, TemplateError::DocumentLevel { tag: "body".into() });
    }

    #[test]
    fn comments_and_script_bodies_skipped() {
        assert_eq!(
            check_fragment("<!-- <div> --><script>if (a < b) { x('</div>') }</script>"),
            Ok(())
        );
        assert_eq!(check_fragment("<!-- <div> -->"), Ok(()));
        assert_eq!(check_fragment("<!-- open"), Err(TemplateError::UnterminatedComment));
        assert_eq!(check_fragment("<script>let a = 1 < 2;</script>"), Ok(()));
        assert!(check_fragment("<script>never closed").is_err());
    }

    #[test]
    fn text_less_than_ignored() {
        assert_eq!(check_fragment("<p>1 < 2 and 3 <= 4</p>"), Ok(()));
    }

    // =========================================================================
    // Document
    // =========================================================================

    #[test]
    fn document_structure() {
        let colors = ColorConfig::default();
        let print = PrintConfig::default();
        let doc = document(&colors, &print, "<h1>テスト</h1>");
        let (html, images) = render_document(&doc).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<html lang="ja" data-theme="light">"#));
        assert!(html.contains("<title>テスト</title>"));
        assert!(html.contains("<h1>テスト</h1>"));
        assert!(html.contains("size: A4;"));
        assert!(html.contains(r#"--font-family: "Noto Sans JP", sans-serif;"#));
        assert!(html.contains("toggleTheme"));
        assert_eq!(images, 0);
    }

    #[test]
    fn dark_mode_sets_theme_attribute() {
        let colors = ColorConfig::default();
        let print = PrintConfig::default();
        let mut doc = document(&colors, &print, "<p>x</p>");
        doc.dark_mode = true;
        let (html, _) = render_document(&doc).unwrap();
        assert!(html.contains(r#"data-theme="dark""#));
    }

    #[test]
    fn custom_css_appended_after_base() {
        let colors = ColorConfig::default();
        let print = PrintConfig::default();
        let mut doc = document(&colors, &print, "<p>x</p>");
        doc.custom_css = Some("body > p { color: red; }");
        let (html, _) = render_document(&doc).unwrap();
        let custom_at = html.find("body > p { color: red; }").unwrap();
        let base_at = html.find("img.badge").unwrap();
        assert!(custom_at > base_at);
    }

    #[test]
    fn title_is_escaped() {
        let colors = ColorConfig::default();
        let print = PrintConfig::default();
        let mut doc = document(&colors, &print, "<p>x</p>");
        doc.title = "<script>alert('xss')</script>".to_string();
        let (html, _) = render_document(&doc).unwrap();
        assert!(html.contains("<title>&lt;script&gt;"));
    }

    #[test]
    fn malformed_fragment_rejected() {
        let colors = ColorConfig::default();
        let print = PrintConfig::default();
        let doc = document(&colors, &print, "<div><p>open");
        assert!(render_document(&doc).is_err());
    }

    #[test]
    fn rendering_is_deterministic() {
        let colors = ColorConfig::default();
        let print = PrintConfig::default();
        let fragment = r#"<p><img src="a.png" alt="a {: size-large}" /></p>"#;
        let mut doc = document(&colors, &print, fragment);
        doc.images.insert(
            ImageRef { src: "a.png".into(), alt: "a {: size-large}".into() },
            classification(ImageKind::Banner, Some(ImageSize::Large)),
        );
        let first = render_document(&doc).unwrap();
        assert_eq!(render_document(&doc).unwrap(), first);
        assert!(first.0.contains(r#"class="banner img-large""#));
    }
}
