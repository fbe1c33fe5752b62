use std::{io, path::PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use tallysheet::{
    export::{self, ExportFormat},
    pipeline::{run_paths, Outcome},
    Config,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile spreadsheet exports into a per-file, per-assignee summary"
)]
struct Args {
    /// Sheet files, zip archives, or folders containing them.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// YAML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Where to write the summary; stdout as CSV when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output format; inferred from the output extension when omitted.
    #[arg(short, long, value_enum)]
    format: Option<ExportFormat>,
    /// Worker threads (0 = one per core).
    #[arg(short, long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // ─── 2) config ───────────────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    // ─── 3) run the batch ────────────────────────────────────────────
    let report = run_paths(&args.paths, &config)?;

    for failure in &report.diagnostics {
        warn!("skipped {}", failure);
    }
    if !report.diagnostics.is_empty() {
        error!("{} sources skipped", report.diagnostics.len());
    }

    let summary = match &report.outcome {
        Outcome::Summary(summary) => summary,
        Outcome::NoData => {
            warn!("no data found in the given inputs");
            return Ok(());
        }
    };

    // ─── 4) hand off ─────────────────────────────────────────────────
    match &args.output {
        Some(path) => {
            let format = match args.format {
                Some(f) => f,
                None => ExportFormat::from_path(path)?,
            };
            export::export(summary, path, format)?;
        }
        None => match args.format.unwrap_or(ExportFormat::Csv) {
            ExportFormat::Json => export::write_json(summary, io::stdout().lock())?,
            ExportFormat::Csv => export::write_csv(&summary.table, io::stdout().lock())?,
            ExportFormat::Parquet => bail!("parquet output needs --output <file>"),
        },
    }

    info!(
        groups = summary.table.groups().len(),
        dates = summary.table.date_columns.len(),
        "done"
    );
    Ok(())
}
