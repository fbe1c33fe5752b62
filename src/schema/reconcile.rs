use anyhow::{bail, Result};
use serde::Serialize;
use tracing::debug;

use super::alias::{normalize_header, AliasTable, LogicalColumn};
use crate::sheet::{CellValue, RawSheet};

/// What happened to one physical header during mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum HeaderRole {
    Mapped(LogicalColumn),
    /// Lost to an earlier column resolving to the same identifier.
    Duplicate(LogicalColumn),
    Ignored,
}

/// Position of each logical column in the physical header row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    positions: [Option<usize>; 5],
    roles: Vec<(String, HeaderRole)>,
}

impl ColumnMapping {
    /// Map raw header text onto the logical schema. Leftmost occurrence wins,
    /// whether the clash comes from identical headers or two aliases.
    pub fn from_headers<S: AsRef<str>>(headers: &[S], aliases: &AliasTable) -> Self {
        let mut positions = [None; 5];
        let mut roles = Vec::with_capacity(headers.len());

        for (idx, raw) in headers.iter().enumerate() {
            let raw = raw.as_ref();
            let role = match aliases.resolve(raw) {
                Some(col) if positions[col.index()].is_none() => {
                    positions[col.index()] = Some(idx);
                    HeaderRole::Mapped(col)
                }
                Some(col) => HeaderRole::Duplicate(col),
                None => HeaderRole::Ignored,
            };
            roles.push((normalize_header(raw), role));
        }

        Self { positions, roles }
    }

    pub fn position(&self, col: LogicalColumn) -> Option<usize> {
        self.positions[col.index()]
    }

    pub fn missing(&self) -> Vec<LogicalColumn> {
        LogicalColumn::ALL
            .into_iter()
            .filter(|c| self.position(*c).is_none())
            .collect()
    }

    pub fn roles(&self) -> &[(String, HeaderRole)] {
        &self.roles
    }
}

/// One row with exactly the logical columns, indexed by [`LogicalColumn::index`].
pub type ReconciledRow = [CellValue; 5];

#[derive(Clone, Debug)]
pub struct ReconciledSheet {
    pub source_name: String,
    pub rows: Vec<ReconciledRow>,
}

/// Project a raw sheet onto the logical schema.
///
/// Absent columns come out as [`CellValue::Empty`]. `SourceFile` is filled
/// from the sheet's name wherever the sheet does not supply one. Fails only
/// when the sheet has no header row at all.
pub fn reconcile(sheet: RawSheet, aliases: &AliasTable) -> Result<ReconciledSheet> {
    let RawSheet { source_name, rows } = sheet;
    let mut rows = rows.into_iter();

    let Some(header_row) = rows.next() else {
        bail!("sheet {} has no header row", source_name);
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| c.as_text().unwrap_or_default())
        .collect();
    let mapping = ColumnMapping::from_headers(&headers, aliases);

    let missing = mapping.missing();
    if !missing.is_empty() {
        debug!(source = %source_name, ?missing, "inserting null columns");
    }

    let out: Vec<ReconciledRow> = rows
        .filter(|row| !row.iter().all(CellValue::is_empty))
        .map(|row| {
            let mut projected: ReconciledRow = LogicalColumn::ALL.map(|col| {
                mapping
                    .position(col)
                    .and_then(|i| row.get(i))
                    .cloned()
                    .unwrap_or(CellValue::Empty)
            });
            let file = &mut projected[LogicalColumn::SourceFile.index()];
            if file.is_empty() {
                *file = CellValue::Text(source_name.clone());
            }
            projected
        })
        .collect();

    Ok(ReconciledSheet {
        source_name,
        rows: out,
    })
}
