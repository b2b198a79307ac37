//! Run configuration.
//!
//! Options are loaded in layers and validated once into an immutable [`Config`]
//! that every stage of the pipeline borrows. Nothing downstream reads ambient
//! state: paths, worker counts, fonts and image rules all flow from here.
//!
//! ## Layers
//!
//! ```text
//! stock defaults          Options::default(), serialized to a TOML table
//!   ← m2h.toml            optional config file (--config, or ./m2h.toml)
//!     ← CLI flags         only the flags the user actually passed
//! ```
//!
//! Each layer is a `toml::Value` merged with [`merge_toml`]: tables merge key by
//! key, everything else (including arrays) replaces. The merged table is then
//! deserialized into [`Options`] and checked by [`Options::validate`].
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # input_dir = "markdown"     # Omit to use ./markdown or ./md, whichever exists
//! output_dir = "html"
//! # max_workers = 4            # Omit for auto (= CPU cores)
//! # custom_css = "print.css"   # Appended after the base stylesheet
//! dark_mode = false
//! debug = false
//! lang = "ja"
//! extensions = ["md"]
//! fonts = ["BIZ UDPGothic", "Hiragino Sans", "Noto Sans JP"]
//! slow_task_warning_secs = 30
//!
//! [markdown]
//! extensions = ["tables", "footnotes", "strikethrough", "tasklists", "definition-list", "hard-breaks"]
//!
//! [print]
//! page_size = "A4"
//! margin = "20mm"
//!
//! [logging]
//! dir = "logs"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::classify::{ImagePattern, RuleSet, RuleStyle};
use crate::markup::MarkdownExtension;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field, if the error is a validation failure.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Directories tried, in order, when `input_dir` is not given.
pub const DEFAULT_INPUT_DIRS: &[&str] = &["markdown", "md"];

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "m2h.toml";

/// Raw run options as written in `m2h.toml` or passed on the command line.
///
/// All fields have defaults. Nothing here is trusted until it has been through
/// [`Options::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Source tree. `None` falls back to [`DEFAULT_INPUT_DIRS`].
    pub input_dir: Option<PathBuf>,
    /// Destination tree, created on demand.
    pub output_dir: PathBuf,
    /// Worker pool size. `None` means one worker per CPU core.
    pub max_workers: Option<usize>,
    /// Stylesheet appended verbatim after the base stylesheet.
    pub custom_css: Option<PathBuf>,
    /// Start documents in the dark theme.
    pub dark_mode: bool,
    /// Debug-level logging.
    pub debug: bool,
    /// Value of the `<html lang>` attribute.
    pub lang: String,
    /// Source file extensions, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Font preference list; `sans-serif` is always appended.
    pub fonts: Vec<String>,
    /// Warn about tasks in flight longer than this. `0` disables the watchdog.
    pub slow_task_warning_secs: u64,
    pub markdown: MarkdownConfig,
    pub colors: ColorConfig,
    pub print: PrintConfig,
    pub images: ImagesConfig,
    pub logging: LoggingConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            input_dir: None,
            output_dir: PathBuf::from("html"),
            max_workers: None,
            custom_css: None,
            dark_mode: false,
            debug: false,
            lang: "ja".to_string(),
            extensions: vec!["md".to_string()],
            fonts: vec![
                "BIZ UDPGothic".to_string(),
                "Hiragino Sans".to_string(),
                "Noto Sans JP".to_string(),
            ],
            slow_task_warning_secs: 30,
            markdown: MarkdownConfig::default(),
            colors: ColorConfig::default(),
            print: PrintConfig::default(),
            images: ImagesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Markdown renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// Syntax extensions handed to the renderer.
    pub extensions: Vec<MarkdownExtension>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            extensions: vec![
                MarkdownExtension::Tables,
                MarkdownExtension::Footnotes,
                MarkdownExtension::Strikethrough,
                MarkdownExtension::Tasklists,
                MarkdownExtension::DefinitionList,
                MarkdownExtension::HardBreaks,
            ],
        }
    }
}

/// Color configuration for the light and dark themes.
///
/// Keys missing from `[colors.light]` or `[colors.dark]` take that theme's
/// default, not the other theme's.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ColorConfigFile")]
pub struct ColorConfig {
    pub light: ColorScheme,
    pub dark: ColorScheme,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            light: ColorScheme::default_light(),
            dark: ColorScheme::default_dark(),
        }
    }
}

/// Individual color scheme (light or dark).
#[derive(Debug, Clone, Serialize)]
pub struct ColorScheme {
    pub background: String,
    pub text: String,
    pub link: String,
    /// Background of code blocks, table headers and quotes.
    pub code_background: String,
    pub border: String,
}

impl ColorScheme {
    pub fn default_light() -> Self {
        Self {
            background: "#ffffff".to_string(),
            text: "#1a1a1a".to_string(),
            link: "#0066cc".to_string(),
            code_background: "#f6f8fa".to_string(),
            border: "#e1e4e8".to_string(),
        }
    }

    pub fn default_dark() -> Self {
        Self {
            background: "#1a1a1a".to_string(),
            text: "#e1e1e1".to_string(),
            link: "#58a6ff".to_string(),
            code_background: "#2d333b".to_string(),
            border: "#30363d".to_string(),
        }
    }

    fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("background", &self.background),
            ("text", &self.text),
            ("link", &self.link),
            ("code_background", &self.code_background),
            ("border", &self.border),
        ]
    }
}

/// `[colors]` as written in the file; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ColorConfigFile {
    light: SchemeOverrides,
    dark: SchemeOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SchemeOverrides {
    background: Option<String>,
    text: Option<String>,
    link: Option<String>,
    code_background: Option<String>,
    border: Option<String>,
}

impl SchemeOverrides {
    fn over(self, base: ColorScheme) -> ColorScheme {
        ColorScheme {
            background: self.background.unwrap_or(base.background),
            text: self.text.unwrap_or(base.text),
            link: self.link.unwrap_or(base.link),
            code_background: self.code_background.unwrap_or(base.code_background),
            border: self.border.unwrap_or(base.border),
        }
    }
}

impl From<ColorConfigFile> for ColorConfig {
    fn from(file: ColorConfigFile) -> Self {
        Self {
            light: file.light.over(ColorScheme::default_light()),
            dark: file.dark.over(ColorScheme::default_dark()),
        }
    }
}

/// Printed page setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrintConfig {
    /// CSS `@page` size keyword.
    pub page_size: String,
    /// Margin on every side of the printed page.
    pub margin: String,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            page_size: "A4".to_string(),
            margin: "20mm".to_string(),
        }
    }
}

/// Image classification rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Replaces the default rule list when present in a config file.
    pub rules: Vec<RuleConfig>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// One image rule as written in config: regex sources, not yet compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub name: String,
    pub patterns: Vec<String>,
    pub style: RuleStyle,
    #[serde(default)]
    pub priority: i32,
}

fn rule(name: &str, patterns: &[&str], style: RuleStyle, priority: i32) -> RuleConfig {
    RuleConfig {
        name: name.to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        style,
        priority,
    }
}

/// Badge, avatar and banner rules used when the config does not supply its own.
pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        rule(
            "badge",
            &[
                r"^//([^/]+\.)?crates\.io(/|$)",
                r"pypi",
                r"zenodo",
                r"badge",
                r"^//([^/]+\.)?shields\.io(/|$)",
                r"passing",
                r"build",
                r"status",
                r"version",
                r"doi",
                r"\.svg$",
            ],
            RuleStyle::Badge,
            100,
        ),
        rule(
            "avatar",
            &[
                r"^//avatars\.[^/]+\.com(/|$)",
                r"/avatar/",
                r"^//([^/]+\.)?gravatar\.com(/|$)",
            ],
            RuleStyle::Avatar,
            50,
        ),
        rule(
            "banner",
            &[r"/banner/", r"banner\.", r"logo", r"header"],
            RuleStyle::Banner,
            25,
        ),
    ]
}

/// Log sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Directory receiving the rolling `conversion.log.*` files.
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

/// Custom stylesheet, loaded during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomStylesheet {
    pub path: PathBuf,
    pub content: String,
}

/// Validated, immutable run configuration.
///
/// Only [`Options::validate`] constructs one. All paths are absolute, the
/// worker count is at least one, and the image rules are compiled.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub custom_css: Option<CustomStylesheet>,
    pub dark_mode: bool,
    pub debug: bool,
    pub lang: String,
    /// Lowercased, without leading dots.
    pub extensions: Vec<String>,
    pub fonts: Vec<String>,
    pub slow_task_warning: Option<Duration>,
    pub markdown_extensions: Vec<MarkdownExtension>,
    pub colors: ColorConfig,
    pub print: PrintConfig,
    pub rules: RuleSet,
    pub log_dir: PathBuf,
}

impl Config {
    /// CSS `font-family` value: configured fonts, then `sans-serif`.
    pub fn font_family(&self) -> String {
        font_family(&self.fonts)
    }

    /// Whether `path` carries one of the configured source extensions.
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|x| *x == e))
    }
}

/// Build a CSS `font-family` list, quoting names that contain spaces.
pub fn font_family(fonts: &[String]) -> String {
    fonts
        .iter()
        .map(String::as_str)
        .chain(std::iter::once("sans-serif"))
        .map(|f| {
            if f.contains(' ') {
                format!("\"{f}\"")
            } else {
                f.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl Options {
    /// Validate and normalize into a [`Config`].
    ///
    /// Checks run in a fixed order so the first reported field is predictable:
    /// input directory, output directory, custom stylesheet, worker count, then
    /// the remaining fields. Only reads the filesystem.
    pub fn validate(&self) -> Result<Config, ConfigError> {
        let input_dir = self.resolve_input_dir()?;

        let output_dir = std::path::absolute(&self.output_dir)
            .map_err(|e| ConfigError::invalid("output_dir", e.to_string()))?;

        let custom_css = self
            .custom_css
            .as_deref()
            .map(load_custom_css)
            .transpose()?;

        let workers = effective_workers(self.max_workers)?;

        let extensions = normalize_extensions(&self.extensions)?;

        for (i, font) in self.fonts.iter().enumerate() {
            if font.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("fonts[{i}]"),
                    "font name must not be empty",
                ));
            }
            check_css_value(&format!("fonts[{i}]"), font)?;
        }

        if self.lang.is_empty()
            || !self
                .lang
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ConfigError::invalid(
                "lang",
                format!("`{}` is not a language tag", self.lang),
            ));
        }

        for (mode, scheme) in [("light", &self.colors.light), ("dark", &self.colors.dark)] {
            for (name, value) in scheme.fields() {
                check_css_value(&format!("colors.{mode}.{name}"), value)?;
            }
        }
        check_css_value("print.page_size", &self.print.page_size)?;
        check_css_value("print.margin", &self.print.margin)?;

        let rules = compile_rules(&self.images.rules)?;

        let slow_task_warning = (self.slow_task_warning_secs > 0)
            .then(|| Duration::from_secs(self.slow_task_warning_secs));

        Ok(Config {
            input_dir,
            output_dir,
            workers,
            custom_css,
            dark_mode: self.dark_mode,
            debug: self.debug,
            lang: self.lang.clone(),
            extensions,
            fonts: self.fonts.clone(),
            slow_task_warning,
            markdown_extensions: self.markdown.extensions.clone(),
            colors: self.colors.clone(),
            print: self.print.clone(),
            rules,
            log_dir: self.logging.dir.clone(),
        })
    }

    fn resolve_input_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.input_dir {
            Some(dir) => dir.clone(),
            None => DEFAULT_INPUT_DIRS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.is_dir())
                .ok_or_else(|| {
                    ConfigError::invalid(
                        "input_dir",
                        format!(
                            "not given and none of {} exists",
                            DEFAULT_INPUT_DIRS.join(", ")
                        ),
                    )
                })?,
        };

        let dir = std::path::absolute(&dir)
            .map_err(|e| ConfigError::invalid("input_dir", e.to_string()))?;
        if !dir.is_dir() {
            return Err(ConfigError::invalid(
                "input_dir",
                format!("{} is not an existing directory", dir.display()),
            ));
        }
        fs::read_dir(&dir).map_err(|e| {
            ConfigError::invalid("input_dir", format!("{} is not readable: {e}", dir.display()))
        })?;
        Ok(dir)
    }
}

fn load_custom_css(path: &Path) -> Result<CustomStylesheet, ConfigError> {
    let path = std::path::absolute(path)
        .map_err(|e| ConfigError::invalid("custom_css", e.to_string()))?;
    let content = fs::read_to_string(&path).map_err(|e| {
        ConfigError::invalid("custom_css", format!("cannot read {}: {e}", path.display()))
    })?;
    if content.to_ascii_lowercase().contains("</style") {
        return Err(ConfigError::invalid(
            "custom_css",
            "stylesheet must not contain a closing </style> tag",
        ));
    }
    Ok(CustomStylesheet { path, content })
}

/// Resolve the worker pool size.
///
/// - `None` → use all available cores
/// - `Some(0)` → rejected
/// - `Some(n)` → `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(requested: Option<usize>) -> Result<usize, ConfigError> {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match requested {
        Some(0) => Err(ConfigError::invalid("max_workers", "must be at least 1")),
        Some(n) => Ok(n.min(cores)),
        None => Ok(cores),
    }
}

fn normalize_extensions(extensions: &[String]) -> Result<Vec<String>, ConfigError> {
    if extensions.is_empty() {
        return Err(ConfigError::invalid("extensions", "must not be empty"));
    }
    extensions
        .iter()
        .enumerate()
        .map(|(i, ext)| {
            let ext = ext.trim().trim_start_matches('.').to_lowercase();
            if ext.is_empty() {
                Err(ConfigError::invalid(
                    format!("extensions[{i}]"),
                    "extension must not be empty",
                ))
            } else {
                Ok(ext)
            }
        })
        .collect()
}

/// Reject values that would break out of a CSS declaration or the style element.
fn check_css_value(field: &str, value: &str) -> Result<(), ConfigError> {
    const FORBIDDEN: &[char] = &['"', '\'', ';', '{', '}', '<', '>', '\\'];
    match value.chars().find(|c| FORBIDDEN.contains(c)) {
        Some(c) => Err(ConfigError::invalid(
            field,
            format!("character `{c}` is not allowed in `{value}`"),
        )),
        None => Ok(()),
    }
}

fn compile_rules(rules: &[RuleConfig]) -> Result<RuleSet, ConfigError> {
    let patterns = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            if rule.patterns.is_empty() {
                return Err(ConfigError::invalid(
                    format!("images.rules[{i}].patterns"),
                    "must not be empty",
                ));
            }
            ImagePattern::compile(&rule.name, &rule.patterns, rule.style, rule.priority)
                .map_err(|e| {
                    ConfigError::invalid(format!("images.rules[{i}].patterns"), e.to_string())
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuleSet::new(patterns))
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default options as a `toml::Value::Table`.
///
/// This is the base layer every other layer is merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Options::default()).expect("default options must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge the layers on top of the stock defaults and deserialize.
pub fn resolve_options(
    layers: impl IntoIterator<Item = toml::Value>,
) -> Result<Options, ConfigError> {
    let merged = layers
        .into_iter()
        .fold(stock_defaults_value(), merge_toml);
    let options: Options = merged.try_into()?;
    Ok(options)
}

/// Load options from an optional config file plus CLI overrides.
///
/// An explicitly named config file must exist; the default `m2h.toml` is
/// optional.
pub fn load_options(
    config_file: Option<&Path>,
    overrides: Option<toml::Value>,
) -> Result<Options, ConfigError> {
    let file_layer = match config_file {
        Some(path) => Some(load_raw_config(path)?.ok_or_else(|| {
            ConfigError::invalid("config", format!("{} does not exist", path.display()))
        })?),
        None => load_raw_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    resolve_options(file_layer.into_iter().chain(overrides))
}

/// Returns a fully-commented stock `m2h.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# m2h configuration
# =================
# All settings are optional. Values shown below are the defaults.
# Command line flags override this file. Unknown keys cause an error.

# Source tree. Omit to use ./markdown or ./md, whichever exists.
# input_dir = "markdown"

# Destination tree. Each source maps to the same relative path with .html.
output_dir = "html"

# Parallel workers. Omit for auto (= number of CPU cores). Larger values are
# clamped to the core count.
# max_workers = 4

# Stylesheet appended after the base stylesheet, so its rules win.
# custom_css = "print.css"

# Start documents in the dark theme.
dark_mode = false

# Debug-level log output.
debug = false

# <html lang> attribute.
lang = "ja"

# Source file extensions (case-insensitive).
extensions = ["md"]

# Font preference list. sans-serif is always appended.
fonts = ["BIZ UDPGothic", "Hiragino Sans", "Noto Sans JP"]

# Log a warning for any file still converting after this many seconds.
# 0 disables the warning.
slow_task_warning_secs = 30

# ---------------------------------------------------------------------------
# Markdown syntax extensions
# ---------------------------------------------------------------------------
[markdown]
# Available: tables, footnotes, strikethrough, tasklists, definition-list,
# smart-punctuation, heading-attributes, hard-breaks
extensions = ["tables", "footnotes", "strikethrough", "tasklists", "definition-list", "hard-breaks"]

# ---------------------------------------------------------------------------
# Colors
# ---------------------------------------------------------------------------
[colors.light]
background = "#ffffff"
text = "#1a1a1a"
link = "#0066cc"
code_background = "#f6f8fa"
border = "#e1e4e8"

[colors.dark]
background = "#1a1a1a"
text = "#e1e1e1"
link = "#58a6ff"
code_background = "#2d333b"
border = "#30363d"

# ---------------------------------------------------------------------------
# Printed page
# ---------------------------------------------------------------------------
[print]
page_size = "A4"
margin = "20mm"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
dir = "logs"

# ---------------------------------------------------------------------------
# Image classification
# ---------------------------------------------------------------------------
# Each image src is matched against every rule (case-insensitive regexes).
# Query strings and fragments are dropped first. A pattern starting with "^//"
# sees URLs as "//host/path"; every other pattern sees only the path.
# Category rules (badge, avatar, banner) and size rules (size-small,
# size-medium, size-large) are resolved separately: the highest priority wins,
# and on equal priority the rule declared first wins. An alt-text annotation
# such as ![Chart {: size-small}](chart.png) always overrides the size.
# Declaring any rule here replaces this whole list.

[[images.rules]]
name = "badge"
patterns = [
    '^//([^/]+\.)?crates\.io(/|$)',
    'pypi',
    'zenodo',
    'badge',
    '^//([^/]+\.)?shields\.io(/|$)',
    'passing',
    'build',
    'status',
    'version',
    'doi',
    '\.svg$',
]
style = "badge"
priority = 100

[[images.rules]]
name = "avatar"
patterns = ['^//avatars\.[^/]+\.com(/|$)', '/avatar/', '^//([^/]+\.)?gravatar\.com(/|$)']
style = "avatar"
priority = 50

[[images.rules]]
name = "banner"
patterns = ['/banner/', 'banner\.', 'logo', 'header']
style = "banner"
priority = 25
"##
}

// =============================================================================
// CSS generation
// =============================================================================

/// Generate CSS custom properties for both themes.
///
/// Light values sit on `:root`; dark values apply under `[data-theme="dark"]`
/// so the theme toggle can switch at runtime.
pub fn generate_color_css(colors: &ColorConfig) -> String {
    format!(
        r#":root {{
    --color-bg: {light_bg};
    --color-text: {light_text};
    --color-link: {light_link};
    --color-code-bg: {light_code_bg};
    --color-border: {light_border};
}}

[data-theme="dark"] {{
    --color-bg: {dark_bg};
    --color-text: {dark_text};
    --color-link: {dark_link};
    --color-code-bg: {dark_code_bg};
    --color-border: {dark_border};
}}"#,
        light_bg = colors.light.background,
        light_text = colors.light.text,
        light_link = colors.light.link,
        light_code_bg = colors.light.code_background,
        light_border = colors.light.border,
        dark_bg = colors.dark.background,
        dark_text = colors.dark.text,
        dark_link = colors.dark.link,
        dark_code_bg = colors.dark.code_background,
        dark_border = colors.dark.border,
    )
}

/// Generate the font custom property.
pub fn generate_font_css(font_family: &str) -> String {
    format!(":root {{\n    --font-family: {font_family};\n}}")
}

/// Generate the `@page` rule for print output.
pub fn generate_page_css(print: &PrintConfig) -> String {
    format!(
        "@page {{\n    size: {};\n    margin: {};\n}}",
        print.page_size, print.margin
    )
}
