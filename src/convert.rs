//! Single-file conversion pipeline.
//!
//! [`convert_file`] takes one [`ConversionTask`] through every stage and
//! always returns a [`ConversionOutcome`]. Nothing escapes the task boundary:
//! I/O errors, renderer errors (including panics), and template errors all
//! become [`ConversionFailure`] values tagged with the stage that failed.
//!
//! ```text
//! read ──► render ──► classify images ──► template ──► write (temp + rename)
//! ```

use crate::classify::Classification;
use crate::config::Config;
use crate::markup::{self, MarkupRenderer, RenderError};
use crate::template::{self, ImageRef, RenderedDocument, TemplateError};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Failure taxonomy shown in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Filesystem read or write failure.
    Resource,
    /// The markup renderer failed or panicked.
    Render,
    /// The fragment could not be embedded in the page.
    Conversion,
}

/// Pipeline stage where a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Read,
    Render,
    Template,
    Write,
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read { .. } | Self::Write { .. } => ErrorKind::Resource,
            Self::Render(_) => ErrorKind::Render,
            Self::Template(_) => ErrorKind::Conversion,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Read { .. } => Stage::Read,
            Self::Render(_) => Stage::Render,
            Self::Template(_) => Stage::Template,
            Self::Write { .. } => Stage::Write,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resource => "resource",
            Self::Render => "render",
            Self::Conversion => "conversion",
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Render => "render",
            Self::Template => "template",
            Self::Write => "write",
        })
    }
}

/// One input file to convert, tagged with its discovery index.
#[derive(Debug, Clone)]
pub struct ConversionTask<'a> {
    pub index: usize,
    pub input: PathBuf,
    /// Path of the input relative to the input directory.
    pub relative: PathBuf,
    pub output: PathBuf,
    pub config: &'a Config,
}

impl<'a> ConversionTask<'a> {
    /// Build a task, mapping the relative path into the output directory.
    pub fn new(index: usize, relative: PathBuf, config: &'a Config) -> Self {
        Self {
            index,
            input: config.input_dir.join(&relative),
            output: output_path(&config.output_dir, &relative),
            relative,
            config,
        }
    }
}

/// `docs/guide.md` under `out/` becomes `out/docs/guide.html`.
pub fn output_path(output_dir: &Path, relative: &Path) -> PathBuf {
    output_dir.join(relative).with_extension("html")
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertedFile {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub image_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionFailure {
    pub input: PathBuf,
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Converted(ConvertedFile),
    Failed(ConversionFailure),
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Converted(_))
    }
}

pub(crate) fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Run the full pipeline for one task.
pub fn convert_file(task: &ConversionTask, renderer: &dyn MarkupRenderer) -> ConversionOutcome {
    let started = Instant::now();
    tracing::debug!(index = task.index, path = %task.input.display(), "conversion started");

    match run_pipeline(task, renderer) {
        Ok(image_count) => {
            let elapsed = started.elapsed();
            tracing::info!(
                index = task.index,
                path = %task.input.display(),
                output = %task.output.display(),
                images = image_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "converted"
            );
            ConversionOutcome::Converted(ConvertedFile {
                input: task.input.clone(),
                output: task.output.clone(),
                elapsed,
                image_count,
            })
        }
        Err(e) => {
            tracing::error!(
                index = task.index,
                path = %task.input.display(),
                stage = %e.stage(),
                kind = %e.kind(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "conversion failed: {e}"
            );
            ConversionOutcome::Failed(ConversionFailure {
                input: task.input.clone(),
                stage: e.stage(),
                kind: e.kind(),
                message: e.to_string(),
            })
        }
    }
}

fn run_pipeline(
    task: &ConversionTask,
    renderer: &dyn MarkupRenderer,
) -> Result<usize, ConvertError> {
    let config = task.config;

    let bytes = fs::read(&task.input).map_err(|source| ConvertError::Read {
        path: task.input.clone(),
        source,
    })?;
    let source = String::from_utf8(bytes).map_err(|e| ConvertError::Read {
        path: task.input.clone(),
        source: io::Error::new(io::ErrorKind::InvalidData, e.utf8_error()),
    })?;

    let fragment = markup::render_guarded(renderer, &source, &config.markdown_extensions)?;

    let images = classify_images(task, &fragment);
    let title = markup::resolve_title(&source, &task.relative);
    let doc = RenderedDocument::new(config, title, fragment, images);
    let (html, image_count) = template::render_document(&doc)?;

    write_atomic(&task.output, html.as_bytes()).map_err(|source| ConvertError::Write {
        path: task.output.clone(),
        source,
    })?;
    Ok(image_count)
}

/// Classify each unique image once. Category conflicts are logged, not fatal.
fn classify_images(task: &ConversionTask, fragment: &str) -> HashMap<ImageRef, Classification> {
    template::scan_images(fragment)
        .into_iter()
        .map(|image| {
            let classification = task.config.rules.classify(&image.src, &image.alt);
            if let Some(conflict) = classification.conflict {
                tracing::warn!(
                    path = %task.input.display(),
                    src = %image.src,
                    annotated = %conflict.annotated,
                    matched = %conflict.matched,
                    rule = classification.rule.as_deref().unwrap_or(""),
                    "image annotation conflicts with matched rule; keeping rule category"
                );
            }
            (image, classification)
        })
        .collect()
}

/// Write through a sibling temp file so readers never see a partial page.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
