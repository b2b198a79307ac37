use clap::{Parser, Subcommand};
use m2h::batch::{self, BatchOptions, RunStatus};
use m2h::config::{self, Config};
use m2h::markup::CmarkRenderer;
use m2h::{logging, output};
use std::path::PathBuf;
use std::process::ExitCode;

/// Options shared by every command that resolves a configuration.
#[derive(clap::Args, Clone)]
struct ConfigArgs {
    /// Markdown source directory (default: ./markdown, then ./md)
    input_dir: Option<PathBuf>,

    /// Output directory
    #[arg(long, short)]
    output_dir: Option<PathBuf>,

    /// Maximum parallel conversions (default: one per CPU core)
    #[arg(long, short = 'j')]
    max_workers: Option<usize>,

    /// Stylesheet appended after the built-in styles
    #[arg(long)]
    custom_css: Option<PathBuf>,

    /// Start documents in the dark theme
    #[arg(long)]
    dark_mode: bool,

    /// Font preference, repeatable; replaces the configured list
    #[arg(long = "font", value_name = "NAME")]
    fonts: Vec<String>,

    /// Debug-level logging
    #[arg(long)]
    debug: bool,

    /// Config file (default: ./m2h.toml if present)
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Clone)]
struct ConvertArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Stop dispatching new files after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "m2h")]
#[command(about = "Convert a tree of Markdown files into print-ready HTML")]
#[command(long_about = "\
Convert a tree of Markdown files into print-ready HTML

Every .md file under the input directory becomes a self-contained .html file
at the same relative path under the output directory. Pages are styled for
Japanese text and A4 printing, with a light/dark theme toggle.

Images are styled by rule: shields.io badges, avatars and banners are
recognized by URL, and alt text annotations set the size:

  ![Chart {: size-small}](chart.png)

Settings are layered: built-in defaults, then m2h.toml, then flags.

Exit status: 0 all files converted, 1 some files failed or the run was
cancelled, 2 nothing was converted (bad configuration, no source files).

Interrupting a run (Ctrl-C) stops it at once. Pages being written at that
moment may leave hidden .<name>.<pid>.tmp files in the output directory, and
no summary or report is written. --fail-fast stops dispatch cleanly instead.

Run 'm2h gen-config' to generate a documented m2h.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert every source file
    Convert(ConvertArgs),
    /// Validate the configuration and list what would be converted
    Check(ConfigArgs),
    /// Print a stock m2h.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let status = match cli.command {
        Command::Convert(args) => convert(&args),
        Command::Check(args) => check(&args),
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            RunStatus::Success
        }
    };
    ExitCode::from(status.exit_code())
}

/// Flags the user actually passed, as a TOML layer over the config file.
fn cli_overrides(args: &ConfigArgs) -> toml::Value {
    let mut table = toml::Table::new();
    if let Some(dir) = &args.input_dir {
        table.insert("input_dir".into(), dir.display().to_string().into());
    }
    if let Some(dir) = &args.output_dir {
        table.insert("output_dir".into(), dir.display().to_string().into());
    }
    if let Some(n) = args.max_workers {
        table.insert("max_workers".into(), toml::Value::Integer(n as i64));
    }
    if let Some(css) = &args.custom_css {
        table.insert("custom_css".into(), css.display().to_string().into());
    }
    if args.dark_mode {
        table.insert("dark_mode".into(), true.into());
    }
    if args.debug {
        table.insert("debug".into(), true.into());
    }
    if !args.fonts.is_empty() {
        let fonts = args.fonts.iter().cloned().map(toml::Value::from).collect();
        table.insert("fonts".into(), toml::Value::Array(fonts));
    }
    toml::Value::Table(table)
}

fn resolve_config(args: &ConfigArgs) -> Result<Config, config::ConfigError> {
    config::load_options(args.config.as_deref(), Some(cli_overrides(args)))?.validate()
}

fn convert(args: &ConvertArgs) -> RunStatus {
    let config = match resolve_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return RunStatus::TotalFailure;
        }
    };

    let _guard = match logging::setup_logging(&config.log_dir, config.debug) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: file logging disabled: {e}");
            None
        }
    };
    logging::log_config(&config);

    let (tx, rx) = std::sync::mpsc::channel();
    let output_dir = config.output_dir.clone();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_batch_event(&event, &output_dir);
        }
    });

    let options = BatchOptions {
        events: Some(tx),
        fail_fast: args.fail_fast,
        ..BatchOptions::default()
    };
    let result = batch::run_batch_with(&config, &CmarkRenderer, options);
    printer.join().ok();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("batch aborted: {e}");
            eprintln!("Error: {e}");
            println!("{}", output::status_line(RunStatus::TotalFailure));
            return RunStatus::TotalFailure;
        }
    };
    output::print_summary(&summary, &config.input_dir);

    if let Some(path) = &args.report {
        let written = serde_json::to_string_pretty(&summary)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            tracing::error!(path = %path.display(), "cannot write report: {e}");
            eprintln!("Error: cannot write report {}: {e}", path.display());
        }
    }
    summary.status()
}

fn check(args: &ConfigArgs) -> RunStatus {
    let config = match resolve_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return RunStatus::TotalFailure;
        }
    };
    match batch::discover(&config) {
        Ok(sources) => {
            output::print_check(&config, sources.len());
            if sources.is_empty() {
                RunStatus::TotalFailure
            } else {
                RunStatus::Success
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            RunStatus::TotalFailure
        }
    }
}
