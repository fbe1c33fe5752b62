pub mod date_parser;

use chrono::NaiveDate;
use serde::Serialize;

use crate::schema::{LogicalColumn, ReconciledSheet};
use date_parser::DateParser;

/// One normalized row. Built once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    pub assigned_to: Option<String>,
    /// Upper-cased.
    pub status: Option<String>,
    pub product_description: Option<String>,
    /// `None` when absent or unparseable; the record still counts toward totals.
    pub date: Option<NaiveDate>,
    pub source_file: String,
}

/// Convert a reconciled sheet into canonical records, consuming it.
pub fn canonicalize(sheet: ReconciledSheet, dates: &DateParser) -> Vec<CanonicalRecord> {
    let ReconciledSheet { source_name, rows } = sheet;
    rows.into_iter()
        .map(|row| {
            let text = |col: LogicalColumn| row[col.index()].as_text();
            CanonicalRecord {
                assigned_to: text(LogicalColumn::AssignedTo),
                status: text(LogicalColumn::Status).map(|s| s.to_uppercase()),
                product_description: text(LogicalColumn::ProductDescription),
                date: dates.parse_cell(&row[LogicalColumn::Date.index()]),
                source_file: text(LogicalColumn::SourceFile)
                    .unwrap_or_else(|| source_name.clone()),
            }
        })
        .collect()
}
