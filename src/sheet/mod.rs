//! Decoding of one sheet file into a [`RawSheet`].
//!
//! Only cell values are read. Column visibility, autofilters and styling are
//! never consulted, so hidden or filtered columns come through as ordinary data.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use tracing::{debug, instrument};

use crate::canonical::date_parser::excel_serial_to_datetime;

/// A decoded cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render as trimmed text; `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            CellValue::Number(v) => Some(format_number(*v)),
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Header row plus data rows of one sheet, tagged with where it came from.
#[derive(Clone, Debug)]
pub struct RawSheet {
    /// File name used as `SourceFile` when the sheet lacks one.
    pub source_name: String,
    /// First row is the header.
    pub rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(source_name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            source_name: source_name.into(),
            rows,
        }
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(v) => CellValue::Number(*v),
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(ndt) => CellValue::DateTime(ndt),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Decode the first worksheet of a workbook held in memory.
#[instrument(level = "debug", skip(bytes), fields(source = %source_name, bytes = bytes.len()))]
pub fn read_sheet(source_name: &str, bytes: Vec<u8>) -> Result<RawSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .with_context(|| format!("opening workbook {}", source_name))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no worksheets", source_name))?
        .with_context(|| format!("reading first worksheet of {}", source_name))?;

    let rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    debug!(rows = rows.len(), width = range.width(), "decoded sheet");
    Ok(RawSheet::new(source_name, rows))
}
