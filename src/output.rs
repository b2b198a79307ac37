//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Convert
//!
//! Progress lines are printed as tasks finish, so their order follows
//! completion. The summary that follows is in discovery order.
//!
//! ```text
//! Converting 3 files with 2 workers
//! [1/3] guide/intro.md → guide/intro.html (4 images, 12 ms)
//! [2/3] notes.md FAILED (render)
//!     Error: renderer failed: unexpected end of input
//! [3/3] readme.md → readme.html (0 images, 3 ms)
//!
//! Converted 2 of 3 files in 0.04s
//! Failures
//! 002 notes.md
//!     Stage: render
//!     Error: renderer failed: unexpected end of input
//! Status: partial failure
//! ```
//!
//! ## Check
//!
//! ```text
//! Config
//!     Input: /home/me/docs/markdown
//!     Output: /home/me/docs/html
//!     Workers: 4
//!     Fonts: "BIZ UDPGothic", "Hiragino Sans", "Noto Sans JP", sans-serif
//! Sources: 12 files
//! ```
//!
//! # Architecture
//!
//! Every `format_*` function returns `Vec<String>` and does no I/O; the
//! `print_*` wrappers write the lines to stdout.

use crate::batch::{BatchEvent, RunStatus, RunSummary};
use crate::config::Config;
use crate::convert::ConversionOutcome;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Path relative to `base` when possible, for compact display.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn format_duration(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{} ms", elapsed.as_millis())
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

// ============================================================================
// Convert
// ============================================================================

/// Format one progress event. Output paths are shown relative to `output_dir`.
pub fn format_batch_event(event: &BatchEvent, output_dir: &Path) -> Vec<String> {
    match event {
        BatchEvent::Started { total, workers } => vec![format!(
            "Converting {} with {}",
            plural(*total, "file", "files"),
            plural(*workers, "worker", "workers")
        )],
        // Start lines would interleave with results; only the log records them.
        BatchEvent::TaskStarted { .. } => Vec::new(),
        BatchEvent::TaskFinished {
            relative,
            done,
            total,
            outcome,
            ..
        } => match outcome {
            ConversionOutcome::Converted(file) => vec![format!(
                "[{done}/{total}] {} → {} ({}, {})",
                relative.display(),
                display_path(&file.output, output_dir),
                plural(file.image_count, "image", "images"),
                format_duration(file.elapsed)
            )],
            ConversionOutcome::Failed(failure) => vec![
                format!("[{done}/{total}] {} FAILED ({})", relative.display(), failure.stage),
                format!("    Error: {}", failure.message),
            ],
        },
        BatchEvent::SlowTask {
            relative, elapsed, ..
        } => vec![format!(
            "    still converting {} after {}",
            relative.display(),
            format_duration(*elapsed)
        )],
        BatchEvent::Cancelled { skipped } => vec![format!(
            "Cancelled: {} not started",
            plural(*skipped, "file", "files")
        )],
    }
}

pub fn print_batch_event(event: &BatchEvent, output_dir: &Path) {
    for line in format_batch_event(event, output_dir) {
        println!("{}", line);
    }
}

/// Format the end-of-run summary. Input paths are shown relative to `input_dir`.
pub fn format_summary(summary: &RunSummary, input_dir: &Path) -> Vec<String> {
    let mut lines = vec![String::new()];

    if summary.discovered == 0 {
        lines.push(format!("No source files found under {}", input_dir.display()));
    } else {
        lines.push(format!(
            "Converted {} of {} in {}",
            summary.succeeded(),
            plural(summary.discovered, "file", "files"),
            format_duration(summary.elapsed)
        ));
    }

    if !summary.failures.is_empty() {
        lines.push("Failures".to_string());
        for (pos, failure) in summary.failures.iter().enumerate() {
            lines.push(format!(
                "{} {}",
                format_index(pos + 1),
                display_path(&failure.input, input_dir)
            ));
            lines.push(format!("    Stage: {}", failure.stage));
            lines.push(format!("    Error: {}", failure.message));
        }
    }

    if !summary.skipped.is_empty() {
        lines.push("Skipped".to_string());
        for (pos, path) in summary.skipped.iter().enumerate() {
            lines.push(format!("{} {}", format_index(pos + 1), display_path(path, input_dir)));
        }
    }

    lines.push(format!("Status: {}", summary.status()));
    lines
}

pub fn print_summary(summary: &RunSummary, input_dir: &Path) {
    for line in format_summary(summary, input_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the resolved configuration and the discovered source count.
pub fn format_check(config: &Config, sources: usize) -> Vec<String> {
    let mut lines = vec![
        "Config".to_string(),
        format!("    Input: {}", config.input_dir.display()),
        format!("    Output: {}", config.output_dir.display()),
        format!("    Workers: {}", config.workers),
        format!("    Extensions: {}", config.extensions.join(", ")),
        format!("    Fonts: {}", config.font_family()),
        format!("    Theme: {}", if config.dark_mode { "dark" } else { "light" }),
        format!("    Page: {} / {}", config.print.page_size, config.print.margin),
    ];
    if let Some(css) = &config.custom_css {
        lines.push(format!("    Custom CSS: {}", css.path.display()));
    }
    if config.rules.is_empty() {
        lines.push("    Image rules: none".to_string());
    } else {
        lines.push(format!("    Image rules: {}", config.rules.len()));
    }
    lines.push(format!("Sources: {}", plural(sources, "file", "files")));
    lines
}

pub fn print_check(config: &Config, sources: usize) {
    for line in format_check(config, sources) {
        println!("{}", line);
    }
}

/// Final line printed for a status, without the summary body.
pub fn status_line(status: RunStatus) -> String {
    format!("Status: {status}")
}
