use crate::table::SummaryTable;

/// Fill `Difference` and `ActualPending` on every group row.
///
/// With `dateSum` the row's dated completions:
/// `Difference = CompletedCount - dateSum` (positive means completions with no
/// recorded date) and `ActualPending = TotalCount - dateSum`.
///
/// The Grand Total row, if already appended, is left as the rollup built it.
pub fn apply(table: &mut SummaryTable) {
    let groups = table.groups().len();
    for row in &mut table.rows[..groups] {
        let date_sum = row.date_sum();
        row.difference = row.completed_count - date_sum;
        row.actual_pending = row.total_count - date_sum;
    }
}
