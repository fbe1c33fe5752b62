//! Fixture builders shared by the in-module tests.

use std::io::{Cursor, Write};

use anyhow::Result;
use rust_xlsxwriter::{Format, Workbook};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tallysheet=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[derive(Clone, Debug)]
pub enum FixtureCell {
    Blank,
    Text(String),
    /// Excel serial written with a date number format.
    Date(f64),
}

/// Builds a single-worksheet xlsx file in memory.
pub struct SheetFixture {
    headers: Vec<String>,
    rows: Vec<Vec<FixtureCell>>,
    hidden: Vec<u16>,
    autofilter: bool,
}

impl SheetFixture {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            hidden: Vec::new(),
            autofilter: false,
        }
    }

    /// Text row; an empty string leaves the cell blank.
    pub fn row(mut self, cells: &[&str]) -> Self {
        self.rows.push(
            cells
                .iter()
                .map(|c| {
                    if c.is_empty() {
                        FixtureCell::Blank
                    } else {
                        FixtureCell::Text(c.to_string())
                    }
                })
                .collect(),
        );
        self
    }

    pub fn cells(mut self, cells: Vec<FixtureCell>) -> Self {
        self.rows.push(cells);
        self
    }

    /// Row with a single date-formatted serial at `col`.
    pub fn date_row(mut self, col: usize, serial: f64) -> Self {
        let mut cells = vec![FixtureCell::Blank; col];
        cells.push(FixtureCell::Date(serial));
        self.rows.push(cells);
        self
    }

    pub fn hide_column(mut self, col: u16) -> Self {
        self.hidden.push(col);
        self
    }

    pub fn with_autofilter(mut self) -> Self {
        self.autofilter = true;
        self
    }

    pub fn build(self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let worksheet = workbook.add_worksheet();

        for (col, header) in self.headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, header)?;
        }
        for (r, row) in self.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    FixtureCell::Blank => {}
                    FixtureCell::Text(s) => {
                        worksheet.write_string(r, c, s)?;
                    }
                    FixtureCell::Date(serial) => {
                        worksheet.write_number_with_format(r, c, *serial, &date_format)?;
                    }
                }
            }
        }
        for col in &self.hidden {
            worksheet.set_column_hidden(*col)?;
        }
        if self.autofilter && !self.headers.is_empty() {
            let last_col = (self.headers.len() - 1) as u16;
            worksheet.autofilter(0, 0, self.rows.len() as u32, last_col)?;
        }

        Ok(workbook.save_to_buffer()?)
    }
}

/// Zip `entries` (name, bytes) into an in-memory archive.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            zip.start_file(*name, options)?;
            zip.write_all(data)?;
        }
        zip.finish()?;
    }
    Ok(buf)
}

/// Overwrite the declared uncompressed size of every entry, in both the local
/// headers and the central directory. The stored data is left alone.
pub fn forge_entry_sizes(archive: &mut [u8], size: u32) {
    let forged = size.to_le_bytes();
    let mut at = 0;
    while at + 4 <= archive.len() {
        let field = match &archive[at..at + 4] {
            b"PK\x03\x04" => Some(at + 22),
            b"PK\x01\x02" => Some(at + 24),
            _ => None,
        };
        match field {
            Some(offset) if offset + 4 <= archive.len() => {
                archive[offset..offset + 4].copy_from_slice(&forged);
                at = offset + 4;
            }
            _ => at += 1,
        }
    }
}

/// The two-file scenario used across the pipeline tests.
pub fn scenario_sheets() -> Result<(Vec<u8>, Vec<u8>)> {
    let file_a = SheetFixture::new(&["ALLOCATED TO", "STATUS", "PRODUCT_DESCRIPTION", "DATE"])
        .row(&["alice", "Completed", "x", "2024-01-01"])
        .row(&["alice", "pending", "y", ""])
        .build()?;
    let file_b = SheetFixture::new(&["date", "Product Description", "status", "Allocated To"])
        .cells(vec![
            FixtureCell::Date(45292.0),
            FixtureCell::Text("z".into()),
            FixtureCell::Text("COMPLETED".into()),
            FixtureCell::Text("bob".into()),
        ])
        .build()?;
    Ok((file_a, file_b))
}
