use std::{fmt, path::PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Structural errors that stop a batch before any output is produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("alias {alias:?} maps to unknown logical column {column:?}")]
    UnknownLogicalColumn { alias: String, column: String },

    #[error("invalid config {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Which stage gave up on a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ArchiveUnreadable,
    SheetUnreadable,
}

impl FailureKind {
    pub fn as_str(&self) -> &str {
        match self {
            FailureKind::ArchiveUnreadable => "archive unreadable",
            FailureKind::SheetUnreadable => "sheet unreadable",
        }
    }
}

/// One skipped source, surfaced once at the end of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    /// Archive-chain path of the source, e.g. `batch.zip!inner.zip!a.xlsx`.
    pub source: String,
    pub kind: FailureKind,
    pub message: String,
}

impl SourceFailure {
    pub fn archive(source: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            source: source.into(),
            kind: FailureKind::ArchiveUnreadable,
            message: format!("{err:#}"),
        }
    }

    pub fn sheet(source: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            source: source.into(),
            kind: FailureKind::SheetUnreadable,
            message: format!("{err:#}"),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.source, self.kind.as_str(), self.message)
    }
}
