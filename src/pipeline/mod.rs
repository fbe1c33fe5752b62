//! Batch driver: blobs in, summary table plus diagnostics out.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    aggregate::{PartialSummary, StatusLabels},
    canonical::{canonicalize, date_parser::DateParser},
    config::Config,
    error::{PipelineError, SourceFailure},
    extract::{collect_blobs, extract_batch, Blob, SheetSource},
    metrics, rollup,
    schema::{reconcile, AliasTable},
    sheet::read_sheet,
    table::SummaryTable,
};

/// Count of records under one label (a status or an assignee).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: Option<String>,
    pub count: u64,
}

/// Everything the presentation layer receives for a non-empty batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub table: SummaryTable,
    pub status_counts: Vec<LabelCount>,
    pub assignee_totals: Vec<LabelCount>,
    /// Records with a product description, per assignee.
    pub product_counts: Vec<LabelCount>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Summary(Summary),
    /// No source produced a single record.
    NoData,
}

#[derive(Clone, Debug)]
pub struct BatchReport {
    pub outcome: Outcome,
    /// Sources that were skipped, in input order.
    pub diagnostics: Vec<SourceFailure>,
    pub sources_seen: usize,
    pub sources_summarized: usize,
    pub records: u64,
}

impl BatchReport {
    pub fn summary(&self) -> Option<&Summary> {
        match &self.outcome {
            Outcome::Summary(s) => Some(s),
            Outcome::NoData => None,
        }
    }
}

/// Read-only state shared by every worker.
struct StageContext {
    aliases: AliasTable,
    dates: DateParser,
    labels: StatusLabels,
}

impl StageContext {
    fn new(config: &Config) -> Result<Self, PipelineError> {
        Ok(Self {
            aliases: AliasTable::from_config(config)?,
            dates: DateParser::new(&config.date_formats),
            labels: StatusLabels::from_config(config),
        })
    }

    /// Decode, reconcile and canonicalize one source, keeping only its counts.
    fn summarize_source(&self, source: SheetSource) -> Result<PartialSummary> {
        let SheetSource { name, origin, bytes } = source;
        let raw = read_sheet(&name, bytes)?;
        let reconciled = reconcile(raw, &self.aliases)?;
        let records = canonicalize(reconciled, &self.dates);
        debug!(source = %origin, records = records.len(), "canonicalized");
        Ok(PartialSummary::from_records(&records, &self.labels))
    }
}

/// Run the whole pipeline over a batch of blobs.
///
/// Bad sources are skipped and listed in [`BatchReport::diagnostics`]. Only a
/// config from which the logical schema cannot be built returns `Err`.
#[instrument(level = "info", skip_all, fields(blobs = blobs.len()))]
pub fn run_batch(blobs: Vec<Blob>, config: &Config) -> Result<BatchReport, PipelineError> {
    let start = Instant::now();
    let ctx = StageContext::new(config)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()?;

    let report = pool.install(|| {
        let extraction = extract_batch(blobs, config);
        let mut diagnostics = extraction.failures;
        let sources_seen = extraction.sources.len();
        let processed = AtomicUsize::new(0);

        let results: Vec<Result<PartialSummary, SourceFailure>> = extraction
            .sources
            .into_par_iter()
            .map(|source| {
                let origin = source.origin.clone();
                let result = ctx.summarize_source(source).map_err(|e| {
                    warn!(source = %origin, error = %format!("{e:#}"), "skipping sheet");
                    SourceFailure::sheet(&origin, &e)
                });
                let n = processed.fetch_add(1, Ordering::Relaxed) + 1;
                info!(source = %origin, processed = n, total = sources_seen, "source done");
                result
            })
            .collect();

        let mut partials = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(p) => partials.push(p),
                Err(f) => diagnostics.push(f),
            }
        }
        let sources_summarized = partials.len();
        let merged = partials
            .into_par_iter()
            .reduce(PartialSummary::default, PartialSummary::merge);

        let records = merged.records;
        let outcome = if merged.is_empty() {
            Outcome::NoData
        } else {
            Outcome::Summary(summarize(&merged))
        };

        BatchReport {
            outcome,
            diagnostics,
            sources_seen,
            sources_summarized,
            records,
        }
    });

    info!(
        sources = report.sources_seen,
        skipped = report.diagnostics.len(),
        records = report.records,
        elapsed = ?start.elapsed(),
        "batch finished"
    );
    Ok(report)
}

/// Widen, derive metrics, then roll up. The order matters: the grand total
/// sums the per-row metrics.
pub fn summarize(merged: &PartialSummary) -> Summary {
    let mut table = SummaryTable::from_partial(merged);
    metrics::apply(&mut table);
    rollup::append_grand_total(&mut table);

    Summary {
        table,
        status_counts: label_counts(&merged.status_counts),
        assignee_totals: label_counts(&merged.assignee_totals),
        product_counts: label_counts(&merged.product_counts),
    }
}

fn label_counts<K>(counts: &BTreeMap<K, u64>) -> Vec<LabelCount>
where
    K: Clone + Into<Option<String>>,
{
    counts
        .iter()
        .map(|(label, count)| LabelCount {
            label: label.clone().into(),
            count: *count,
        })
        .collect()
}

/// Collect files from disk and run the batch over them.
pub fn run_paths(paths: &[PathBuf], config: &Config) -> Result<BatchReport> {
    let (blobs, read_failures) = collect_blobs(paths, config)?;
    let mut report = run_batch(blobs, config).context("running batch")?;
    if !read_failures.is_empty() {
        let mut diagnostics = read_failures;
        diagnostics.append(&mut report.diagnostics);
        report.diagnostics = diagnostics;
    }
    Ok(report)
}
