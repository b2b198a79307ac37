//! # m2h
//!
//! Batch converter from a tree of Markdown files to self-contained,
//! print-ready HTML pages, tuned for Japanese typography and A4 paper.
//!
//! # Architecture: Per-File Pipeline, Parallel Batch
//!
//! A run resolves one immutable [`config::Config`], discovers every source
//! file, and converts them on a fixed-size worker pool. Each conversion is an
//! independent pipeline that never fails the batch:
//!
//! ```text
//! read  source.md     →  text
//! render              →  HTML fragment          (markup)
//! classify images     →  CSS classes per <img>  (classify)
//! template            →  complete document      (template)
//! write output.html   (temp file + rename)      (convert)
//! ```
//!
//! The batch ([`batch::run_batch`]) collects one outcome per file and reports
//! them in discovery order, so the summary is the same however the workers
//! were scheduled.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `m2h.toml` loading, layered merge with CLI flags, validation, CSS variables |
//! | [`classify`] | Image classification rules and alt-text annotations |
//! | [`markup`] | Markdown renderer seam and the `pulldown-cmark` implementation |
//! | [`template`] | Page assembly with Maud: stylesheet, theme toggle, image classes |
//! | [`convert`] | Single-file pipeline producing a `ConversionOutcome` |
//! | [`batch`] | Discovery, worker pool, cancellation, run summary |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber with a rolling log file |
//!
//! # Design Decisions
//!
//! ## Configuration Is a Value
//!
//! Defaults, the config file and CLI flags are merged as TOML values, then
//! validated once into [`config::Config`]. Every component receives it by
//! reference; nothing reads global settings.
//!
//! ## Failures Are Outcomes
//!
//! Only configuration problems (including two inputs colliding on one output
//! path) stop a run. Everything that can go wrong with a single file,
//! renderer panics included, becomes a failed [`convert::ConversionOutcome`]
//! and the remaining files still convert.
//!
//! ## Self-Contained Output
//!
//! Each page inlines its stylesheet and the theme script, so a converted file
//! can be mailed, archived or printed without anything next to it.

pub mod batch;
pub mod classify;
pub mod config;
pub mod convert;
pub mod logging;
pub mod markup;
pub mod output;
pub mod template;

#[cfg(test)]
pub(crate) mod test_helpers;
