use tracing::debug;

use crate::table::{SummaryRow, SummaryTable};

pub const GRAND_TOTAL_SOURCE: &str = "Grand Total";
pub const GRAND_TOTAL_ASSIGNEE: &str = "-";

/// Append the column-wise sum of all group rows as the last row.
///
/// Must run after [`crate::metrics::apply`]: the rollup's `Difference` and
/// `ActualPending` are sums of the per-row values, not recomputed from the
/// rolled-up counts. Calling it twice is a no-op.
pub fn append_grand_total(table: &mut SummaryTable) {
    if table.has_grand_total {
        return;
    }

    let mut total = SummaryRow {
        source_file: GRAND_TOTAL_SOURCE.to_string(),
        assigned_to: Some(GRAND_TOTAL_ASSIGNEE.to_string()),
        date_counts: vec![0; table.date_columns.len()],
        ..Default::default()
    };
    for row in &table.rows {
        total.total_count += row.total_count;
        total.completed_count += row.completed_count;
        total.pending_count += row.pending_count;
        for (sum, n) in total.date_counts.iter_mut().zip(&row.date_counts) {
            *sum += n;
        }
        total.difference += row.difference;
        total.actual_pending += row.actual_pending;
    }

    debug!(groups = table.rows.len(), total = total.total_count, "appended grand total");
    table.rows.push(total);
    table.has_grand_total = true;
}
