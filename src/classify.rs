//! Image classification.
//!
//! Every `<img>` in a rendered document gets a visual treatment: badges are
//! shrunk to text height, avatars become small circles, banners are capped in
//! height, and everything else is a plain content image. An optional size
//! class (`img-small`, `img-medium`, `img-large`) caps the height further.
//!
//! ## Inputs
//!
//! - **`src`**: matched against the [`RuleSet`] after normalization
//!   (lowercased, `?query` and `#fragment` dropped). Rule expressions
//!   starting with `^//` see URLs as `//host/path`; the rest see the path.
//! - **`alt`**: may carry an annotation block parsed once per reference:
//!
//! ```text
//! ![Architecture {: size-small}](diagram.png)    explicit size
//! ![CI {: .badge}](https://example.com/ci.png)    explicit category
//! ```
//!
//! ## Resolution
//!
//! Category and size are independent axes. On each axis the matching rule with
//! the highest priority wins; on equal priority the rule declared first wins.
//! An explicit size annotation always overrides the pattern size. An explicit
//! category only applies when no category rule matched. When both exist and
//! disagree, the rule's category is kept and a [`CategoryConflict`] is
//! attached so the caller can log it.
//!
//! Classification is a pure function of the reference and the rule set. The
//! rule set is immutable after construction and shared by reference across
//! workers.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Visual category of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageKind {
    Plain,
    Badge,
    Avatar,
    Banner,
}

impl ImageKind {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Plain => "content-image",
            Self::Badge => "badge",
            Self::Avatar => "avatar",
            Self::Banner => "banner",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.trim_start_matches('.') {
            "badge" => Some(Self::Badge),
            "avatar" => Some(Self::Avatar),
            "banner" => Some(Self::Banner),
            _ => None,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_class())
    }
}

/// Height cap applied on top of the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageSize {
    Small,
    Medium,
    Large,
}

impl ImageSize {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Small => "img-small",
            Self::Medium => "img-medium",
            Self::Large => "img-large",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.trim_start_matches('.') {
            "size-small" => Some(Self::Small),
            "size-medium" => Some(Self::Medium),
            "size-large" => Some(Self::Large),
            _ => None,
        }
    }
}

/// What a rule assigns when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleStyle {
    Badge,
    Avatar,
    Banner,
    SizeSmall,
    SizeMedium,
    SizeLarge,
}

impl RuleStyle {
    pub fn kind(self) -> Option<ImageKind> {
        match self {
            Self::Badge => Some(ImageKind::Badge),
            Self::Avatar => Some(ImageKind::Avatar),
            Self::Banner => Some(ImageKind::Banner),
            _ => None,
        }
    }

    pub fn size(self) -> Option<ImageSize> {
        match self {
            Self::SizeSmall => Some(ImageSize::Small),
            Self::SizeMedium => Some(ImageSize::Medium),
            Self::SizeLarge => Some(ImageSize::Large),
            _ => None,
        }
    }
}

/// A named, compiled classification rule.
///
/// Expressions starting with `//` or `^//` see the host as `//host/path`.
/// All others see only the path.
#[derive(Debug, Clone)]
pub struct ImagePattern {
    pub name: String,
    host_patterns: Vec<Regex>,
    path_patterns: Vec<Regex>,
    pub style: RuleStyle,
    pub priority: i32,
}

fn is_host_anchored(expr: &str) -> bool {
    expr.starts_with("//") || expr.starts_with("^//")
}

impl ImagePattern {
    /// Compile the rule's expressions case-insensitively.
    pub fn compile<S: AsRef<str>>(
        name: &str,
        patterns: &[S],
        style: RuleStyle,
        priority: i32,
    ) -> Result<Self, regex::Error> {
        let mut host_patterns = Vec::new();
        let mut path_patterns = Vec::new();
        for expr in patterns.iter().map(AsRef::as_ref) {
            let regex = RegexBuilder::new(expr).case_insensitive(true).build()?;
            if is_host_anchored(expr) {
                host_patterns.push(regex);
            } else {
                path_patterns.push(regex);
            }
        }
        Ok(Self {
            name: name.to_string(),
            host_patterns,
            path_patterns,
            style,
            priority,
        })
    }

    /// Whether any expression matches the normalized reference.
    pub fn matches(&self, reference: &NormalizedRef) -> bool {
        self.host_patterns.iter().any(|p| p.is_match(reference.full()))
            || self.path_patterns.iter().any(|p| p.is_match(reference.path()))
    }
}

/// Ordered, immutable rule list. Declaration order breaks priority ties.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ImagePattern>,
}

/// Alt-text annotation: `{: token ...}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Annotation {
    pub kind: Option<ImageKind>,
    pub size: Option<ImageSize>,
}

/// Explicit category disagreeing with the matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryConflict {
    pub annotated: ImageKind,
    pub matched: ImageKind,
}

/// Result of classifying one image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ImageKind,
    pub size: Option<ImageSize>,
    /// Name of the rule that decided the category, if any.
    pub rule: Option<String>,
    pub conflict: Option<CategoryConflict>,
}

impl Classification {
    /// CSS classes for the `<img>` element: category first, then size.
    pub fn css_classes(&self) -> Vec<&'static str> {
        let mut classes = vec![self.kind.css_class()];
        classes.extend(self.size.map(ImageSize::css_class));
        classes
    }
}

static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{:([^}]*)\}").expect("annotation regex is valid"));

/// Parse every annotation block in `alt`. Later tokens override earlier ones.
pub fn parse_annotation(alt: &str) -> Annotation {
    let mut annotation = Annotation::default();
    for block in ANNOTATION.captures_iter(alt) {
        for token in block[1].split_whitespace() {
            let token = token.to_ascii_lowercase();
            if let Some(size) = ImageSize::from_token(&token) {
                annotation.size = Some(size);
            } else if let Some(kind) = ImageKind::from_token(&token) {
                annotation.kind = Some(kind);
            }
        }
    }
    annotation
}

/// Remove annotation blocks from alt text.
pub fn strip_annotations(alt: &str) -> String {
    ANNOTATION.replace_all(alt, "").trim().to_string()
}

/// Lowercased image reference without query string or fragment.
///
/// URLs become `//host/path` with scheme and user info removed. Relative
/// references are all path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRef {
    full: String,
    path_start: usize,
}

impl NormalizedRef {
    pub fn full(&self) -> &str {
        &self.full
    }

    pub fn path(&self) -> &str {
        &self.full[self.path_start..]
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }
}

fn is_scheme(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_alphabetic())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

pub fn normalize_reference(src: &str) -> NormalizedRef {
    let end = src.find(['?', '#']).unwrap_or(src.len());
    let lowered = src[..end].trim().to_lowercase();

    let authority_start = match lowered.find("://") {
        Some(i) if is_scheme(&lowered[..i]) => Some(i + 3),
        _ => lowered.starts_with("//").then_some(2),
    };
    let Some(start) = authority_start else {
        return NormalizedRef {
            full: lowered,
            path_start: 0,
        };
    };

    let rest = &lowered[start..];
    let host_end = rest.find('/').unwrap_or(rest.len());
    let host = rest[..host_end].rsplit('@').next().unwrap_or_default();
    NormalizedRef {
        full: format!("//{host}{}", &rest[host_end..]),
        path_start: 2 + host.len(),
    }
}

/// First rule with the strictly highest priority.
fn best<'a>(rules: impl Iterator<Item = &'a ImagePattern>) -> Option<&'a ImagePattern> {
    let mut best: Option<&ImagePattern> = None;
    for rule in rules {
        if best.is_none_or(|b| rule.priority > b.priority) {
            best = Some(rule);
        }
    }
    best
}

impl RuleSet {
    pub fn new(rules: Vec<ImagePattern>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify one image by its `src` and `alt` text.
    pub fn classify(&self, src: &str, alt: &str) -> Classification {
        let annotation = parse_annotation(alt);
        let normalized = normalize_reference(src);

        let matched: Vec<&ImagePattern> = if normalized.is_empty() {
            Vec::new()
        } else {
            self.rules.iter().filter(|r| r.matches(&normalized)).collect()
        };

        let kind_rule = best(matched.iter().copied().filter(|r| r.style.kind().is_some()));
        let size_rule = best(matched.iter().copied().filter(|r| r.style.size().is_some()));
        let matched_kind = kind_rule.and_then(|r| r.style.kind());

        let (kind, conflict) = match (annotation.kind, matched_kind) {
            (Some(annotated), Some(matched)) if annotated != matched => (
                matched,
                Some(CategoryConflict { annotated, matched }),
            ),
            (_, Some(matched)) => (matched, None),
            (Some(annotated), None) => (annotated, None),
            (None, None) => (ImageKind::Plain, None),
        };

        Classification {
            kind,
            size: annotation
                .size
                .or_else(|| size_rule.and_then(|r| r.style.size())),
            rule: kind_rule.map(|r| r.name.clone()),
            conflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_rules;

    fn default_set() -> RuleSet {
        RuleSet::new(
            default_rules()
                .iter()
                .map(|r| ImagePattern::compile(&r.name, &r.patterns, r.style, r.priority).unwrap())
                .collect(),
        )
    }

    fn pattern(name: &str, expr: &str, style: RuleStyle, priority: i32) -> ImagePattern {
        ImagePattern::compile(name, &[expr], style, priority).unwrap()
    }

    #[test]
    fn shields_badge_is_badge() {
        let c = default_set().classify("https://img.shields.io/crates/v/foo", "crate");
        assert_eq!(c.kind, ImageKind::Badge);
        assert_eq!(c.rule.as_deref(), Some("badge"));
        assert_eq!(c.css_classes(), vec!["badge"]);
    }

    #[test]
    fn svg_with_query_string_is_badge() {
        let c = default_set().classify("https://example.com/ci.svg?style=flat", "");
        assert_eq!(c.kind, ImageKind::Badge);
    }

    #[test]
    fn avatar_host_matches() {
        let c = default_set().classify("https://avatars.githubusercontent.com/u/1?v=4", "");
        assert_eq!(c.kind, ImageKind::Avatar);
    }

    #[test]
    fn logo_is_banner() {
        let c = default_set().classify("images/Company-Logo.PNG", "logo");
        assert_eq!(c.kind, ImageKind::Banner);
    }

    #[test]
    fn unmatched_is_plain() {
        let c = default_set().classify("photos/kyoto.jpg", "Kyoto");
        assert_eq!(c.kind, ImageKind::Plain);
        assert_eq!(c.size, None);
        assert_eq!(c.rule, None);
        assert_eq!(c.css_classes(), vec!["content-image"]);
    }

    #[test]
    fn empty_src_is_plain_but_keeps_size() {
        let c = default_set().classify("", "{: size-large}");
        assert_eq!(c.kind, ImageKind::Plain);
        assert_eq!(c.size, Some(ImageSize::Large));
    }

    #[test]
    fn higher_priority_wins() {
        // "badge-logo.png" matches both badge (100) and banner (25)
        let c = default_set().classify("badge-logo.png", "");
        assert_eq!(c.kind, ImageKind::Badge);
    }

    #[test]
    fn equal_priority_first_declared_wins() {
        let set = RuleSet::new(vec![
            pattern("a", "shared", RuleStyle::Avatar, 10),
            pattern("b", "shared", RuleStyle::Banner, 10),
        ]);
        let c = set.classify("img/shared.png", "");
        assert_eq!(c.kind, ImageKind::Avatar);
        assert_eq!(c.rule.as_deref(), Some("a"));

        let reversed = RuleSet::new(vec![
            pattern("b", "shared", RuleStyle::Banner, 10),
            pattern("a", "shared", RuleStyle::Avatar, 10),
        ]);
        assert_eq!(reversed.classify("img/shared.png", "").kind, ImageKind::Banner);
    }

    #[test]
    fn classification_is_deterministic() {
        let set = default_set();
        let first = set.classify("https://zenodo.org/badge/DOI.svg", "{: size-small}");
        for _ in 0..20 {
            assert_eq!(set.classify("https://zenodo.org/badge/DOI.svg", "{: size-small}"), first);
        }
    }

    #[test]
    fn size_annotation_overrides_pattern_size() {
        let set = RuleSet::new(vec![
            pattern("diagrams", "diagrams/", RuleStyle::SizeLarge, 0),
            pattern("logo", "logo", RuleStyle::Banner, 0),
        ]);
        let from_rule = set.classify("diagrams/logo-flow.png", "");
        assert_eq!(from_rule.size, Some(ImageSize::Large));
        assert_eq!(from_rule.kind, ImageKind::Banner);

        let annotated = set.classify("diagrams/logo-flow.png", "Flow {: size-small}");
        assert_eq!(annotated.size, Some(ImageSize::Small));
        // Category is untouched by the size annotation
        assert_eq!(annotated.kind, ImageKind::Banner);
        assert_eq!(annotated.css_classes(), vec!["banner", "img-small"]);
    }

    #[test]
    fn category_annotation_applies_without_rule_match() {
        let c = default_set().classify("me.jpg", "{: .avatar}");
        assert_eq!(c.kind, ImageKind::Avatar);
        assert!(c.conflict.is_none());
    }

    #[test]
    fn category_conflict_keeps_rule_and_reports() {
        let c = default_set().classify("https://img.shields.io/x.svg", "{: banner}");
        assert_eq!(c.kind, ImageKind::Badge);
        assert_eq!(
            c.conflict,
            Some(CategoryConflict {
                annotated: ImageKind::Banner,
                matched: ImageKind::Badge,
            })
        );
    }

    #[test]
    fn parse_annotation_reads_tokens() {
        assert_eq!(
            parse_annotation("Chart {: .badge size-medium }"),
            Annotation {
                kind: Some(ImageKind::Badge),
                size: Some(ImageSize::Medium),
            }
        );
        assert_eq!(parse_annotation("no annotation"), Annotation::default());
        assert_eq!(parse_annotation("{: unknown}"), Annotation::default());
    }

    #[test]
    fn strip_annotations_cleans_alt() {
        assert_eq!(strip_annotations("Chart {: size-small}"), "Chart");
        assert_eq!(strip_annotations("{: size-small} "), "");
        assert_eq!(strip_annotations("plain alt"), "plain alt");
    }

    #[test]
    fn normalize_reference_drops_query_and_fragment() {
        assert_eq!(normalize_reference("A/B.SVG?x=1#top").full(), "a/b.svg");
        assert_eq!(normalize_reference("img.png#frag").path(), "img.png");
    }

    #[test]
    fn normalize_reference_splits_host_from_path() {
        let r = normalize_reference("HTTPS://user@Img.Shields.io/badge/x?style=flat");
        assert_eq!(r.full(), "//img.shields.io/badge/x");
        assert_eq!(r.path(), "/badge/x");

        let r = normalize_reference("//cdn.example.com");
        assert_eq!(r.full(), "//cdn.example.com");
        assert_eq!(r.path(), "");

        let r = normalize_reference("docs/a://b.png");
        assert_eq!(r.path(), "docs/a://b.png");
    }

    #[test]
    fn path_words_ignore_host() {
        let set = default_set();
        assert_eq!(
            set.classify("https://status.example.com/photo.jpg", "").kind,
            ImageKind::Plain
        );
        assert_eq!(
            set.classify("https://build.example.org/team/kyoto.jpg", "").kind,
            ImageKind::Plain
        );
        assert_eq!(
            set.classify("https://example.com/status/uptime.png", "").kind,
            ImageKind::Badge
        );
        assert_eq!(set.classify("https://img.shields.io/npm/v/x", "").kind, ImageKind::Badge);
        assert_eq!(
            set.classify("https://secure.gravatar.com/abc123", "").kind,
            ImageKind::Avatar
        );
    }

    #[test]
    fn host_anchored_expression_needs_url() {
        let cdn = pattern("cdn", r"^//cdn\.example\.com/", RuleStyle::Banner, 0);
        let set = RuleSet::new(vec![cdn]);
        assert_eq!(set.classify("https://cdn.example.com/a.png", "").kind, ImageKind::Banner);
        assert_eq!(set.classify("cdn.example.com/a.png", "").kind, ImageKind::Plain);
    }
}
