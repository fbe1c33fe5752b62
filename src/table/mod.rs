//! The wide summary table handed to presentation and export.

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::PartialSummary;

pub const SOURCE_FILE: &str = "SourceFile";
pub const ASSIGNED_TO: &str = "AssignedTo";
pub const TOTAL_COUNT: &str = "TotalCount";
pub const COMPLETED_COUNT: &str = "CompletedCount";
pub const PENDING_COUNT: &str = "PendingCount";
pub const DIFFERENCE: &str = "Difference";
pub const ACTUAL_PENDING: &str = "ActualPending";

/// One (SourceFile, AssignedTo) group, or the grand total.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub source_file: String,
    pub assigned_to: Option<String>,
    pub total_count: i64,
    pub completed_count: i64,
    pub pending_count: i64,
    /// Completed count per date, aligned with [`SummaryTable::date_columns`].
    pub date_counts: Vec<i64>,
    pub difference: i64,
    pub actual_pending: i64,
}

impl SummaryRow {
    pub fn date_sum(&self) -> i64 {
        self.date_counts.iter().sum()
    }

    /// Numeric cells in column order.
    pub fn numeric_values(&self) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.date_counts.len() + 5);
        out.extend([self.total_count, self.completed_count, self.pending_count]);
        out.extend(self.date_counts.iter().copied());
        out.extend([self.difference, self.actual_pending]);
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTable {
    /// Ascending; one column per distinct date in the batch.
    pub date_columns: Vec<NaiveDate>,
    pub rows: Vec<SummaryRow>,
    /// Whether the last row is the grand total.
    pub has_grand_total: bool,
}

impl SummaryTable {
    /// Widen a merged partial into one row per group, sorted by key.
    ///
    /// Groups are the seed: every group gets a row, and dates it never
    /// completed anything on are zero. Derived metrics are left at zero.
    pub fn from_partial(partial: &PartialSummary) -> Self {
        let date_columns: Vec<NaiveDate> = partial.dates.iter().copied().collect();

        let rows = partial
            .groups
            .iter()
            .map(|(key, tally)| SummaryRow {
                source_file: key.source_file.clone(),
                assigned_to: key.assigned_to.clone(),
                total_count: tally.total as i64,
                completed_count: tally.completed as i64,
                pending_count: tally.pending as i64,
                date_counts: date_columns
                    .iter()
                    .map(|d| tally.completed_by_date.get(d).copied().unwrap_or(0) as i64)
                    .collect(),
                difference: 0,
                actual_pending: 0,
            })
            .collect();

        Self {
            date_columns,
            rows,
            has_grand_total: false,
        }
    }

    /// Rows excluding the grand total.
    pub fn groups(&self) -> &[SummaryRow] {
        if self.has_grand_total {
            &self.rows[..self.rows.len().saturating_sub(1)]
        } else {
            &self.rows
        }
    }

    pub fn grand_total(&self) -> Option<&SummaryRow> {
        if self.has_grand_total {
            self.rows.last()
        } else {
            None
        }
    }

    pub fn date_column_names(&self) -> Vec<String> {
        self.date_columns
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect()
    }

    /// All column names in output order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [SOURCE_FILE, ASSIGNED_TO, TOTAL_COUNT, COMPLETED_COUNT, PENDING_COUNT]
            .into_iter()
            .map(String::from)
            .collect();
        names.extend(self.date_column_names());
        names.extend([DIFFERENCE.to_string(), ACTUAL_PENDING.to_string()]);
        names
    }

    /// Count column for `date`, if the batch has one.
    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_columns.binary_search(&date).ok()
    }
}
