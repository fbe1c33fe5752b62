//! Dump the summary table in a format the collaborator layer can pick up.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use arrow::{
    array::{ArrayRef, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use tracing::info;

use crate::{
    pipeline::Summary,
    table::{
        SummaryRow, SummaryTable, ACTUAL_PENDING, ASSIGNED_TO, COMPLETED_COUNT, DIFFERENCE, PENDING_COUNT,
        SOURCE_FILE, TOTAL_COUNT,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Parquet,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            other => bail!(
                "cannot infer export format from extension {:?} of {}",
                other,
                path.display()
            ),
        }
    }
}

impl SummaryTable {
    pub fn arrow_schema(&self) -> Schema {
        let count = |name: &str| Field::new(name, DataType::Int64, false);
        let mut fields = vec![
            Field::new(SOURCE_FILE, DataType::Utf8, false),
            Field::new(ASSIGNED_TO, DataType::Utf8, true),
            count(TOTAL_COUNT),
            count(COMPLETED_COUNT),
            count(PENDING_COUNT),
        ];
        fields.extend(self.date_column_names().iter().map(|n| count(n.as_str())));
        fields.push(count(DIFFERENCE));
        fields.push(count(ACTUAL_PENDING));
        Schema::new(fields)
    }

    /// Materialize the wide table as one Arrow batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let rows = &self.rows;
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.source_file.as_str()),
            )),
            Arc::new(
                rows.iter()
                    .map(|r| r.assigned_to.as_deref())
                    .collect::<StringArray>(),
            ),
            int_column(rows, |r| r.total_count),
            int_column(rows, |r| r.completed_count),
            int_column(rows, |r| r.pending_count),
        ];
        for i in 0..self.date_columns.len() {
            columns.push(int_column(rows, |r| {
                r.date_counts.get(i).copied().unwrap_or(0)
            }));
        }
        columns.push(int_column(rows, |r| r.difference));
        columns.push(int_column(rows, |r| r.actual_pending));

        RecordBatch::try_new(Arc::new(self.arrow_schema()), columns)
            .context("building summary record batch")
    }
}

fn int_column(rows: &[SummaryRow], f: impl Fn(&SummaryRow) -> i64) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(rows.iter().map(f)))
}

pub fn write_csv<W: Write>(table: &SummaryTable, writer: W) -> Result<()> {
    let batch = table.to_record_batch()?;
    let mut csv = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(writer);
    csv.write(&batch).context("writing csv")?;
    Ok(())
}

pub fn write_parquet(table: &SummaryTable, path: &Path) -> Result<()> {
    let batch = table.to_record_batch()?;
    let file =
        File::create(path).with_context(|| format!("creating parquet file {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(&batch).context("writing summary batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Whole summary, including the status and assignee breakdowns.
pub fn write_json<W: Write>(summary: &Summary, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, summary).context("writing json")?;
    Ok(())
}

/// Write `summary` to `path` in `format`.
pub fn export(summary: &Summary, path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Parquet => write_parquet(&summary.table, path)?,
        ExportFormat::Csv | ExportFormat::Json => {
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            let mut out = BufWriter::new(file);
            if format == ExportFormat::Csv {
                write_csv(&summary.table, &mut out)?;
            } else {
                write_json(summary, &mut out)?;
            }
            out.flush()
                .with_context(|| format!("flushing {}", path.display()))?;
        }
    }
    info!(path = %path.display(), ?format, rows = summary.table.rows.len(), "exported summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::{PartialSummary, StatusLabels},
        canonical::CanonicalRecord,
        pipeline::summarize,
    };
    use arrow::array::Array;
    use chrono::NaiveDate;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn sample() -> Summary {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1);
        let records = vec![
            CanonicalRecord {
                assigned_to: Some("alice".into()),
                status: Some("COMPLETED".into()),
                product_description: Some("x".into()),
                date: d,
                source_file: "fileA.xlsx".into(),
            },
            CanonicalRecord {
                assigned_to: None,
                status: Some("PENDING".into()),
                product_description: None,
                date: None,
                source_file: "fileA.xlsx".into(),
            },
        ];
        summarize(&PartialSummary::from_records(&records, &StatusLabels::default()))
    }

    #[test]
    fn record_batch_is_wide_with_nullable_assignee() -> Result<()> {
        let summary = sample();
        let batch = summary.table.to_record_batch()?;
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 8);
        assert_eq!(batch.schema().field(5).name(), "2024-01-01");

        let who = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        // null assignee sorts first
        assert!(who.is_null(0));
        assert_eq!(who.value(1), "alice");
        assert_eq!(who.value(2), "-");
        Ok(())
    }

    #[test]
    fn csv_has_header_and_grand_total() -> Result<()> {
        let mut buf = Vec::new();
        write_csv(&sample().table, &mut buf)?;
        let text = String::from_utf8(buf)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "SourceFile,AssignedTo,TotalCount,CompletedCount,PendingCount,2024-01-01,Difference,ActualPending"
        );
        assert_eq!(lines[2], "fileA.xlsx,alice,1,1,0,1,0,0");
        assert_eq!(lines[3], "Grand Total,-,2,1,1,1,0,1");
        Ok(())
    }

    #[test]
    fn parquet_round_trips_row_count() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("summary.parquet");
        export(&sample(), &path, ExportFormat::from_path(&path)?)?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let rows: usize = reader.map(|b| b.map(|b| b.num_rows()).unwrap_or(0)).sum();
        assert_eq!(rows, 3);
        Ok(())
    }

    #[test]
    fn json_carries_breakdowns() -> Result<()> {
        let mut buf = Vec::new();
        write_json(&sample(), &mut buf)?;
        let value: serde_json::Value = serde_json::from_slice(&buf)?;
        assert_eq!(value["table"]["rows"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["status_counts"][0]["label"], "COMPLETED");
        assert_eq!(value["product_counts"][1]["label"], "alice");
        assert_eq!(value["product_counts"][1]["count"], 1);
        Ok(())
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(ExportFormat::from_path(Path::new("out.xlsx")).is_err());
        assert_eq!(
            ExportFormat::from_path(Path::new("OUT.CSV")).ok(),
            Some(ExportFormat::Csv)
        );
    }
}
