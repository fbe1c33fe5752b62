use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{config::Config, error::PipelineError};

/// The fixed columns every canonical record carries, in output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LogicalColumn {
    AssignedTo,
    Status,
    ProductDescription,
    Date,
    SourceFile,
}

impl LogicalColumn {
    pub const ALL: [LogicalColumn; 5] = [
        LogicalColumn::AssignedTo,
        LogicalColumn::Status,
        LogicalColumn::ProductDescription,
        LogicalColumn::Date,
        LogicalColumn::SourceFile,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalColumn::AssignedTo => "AssignedTo",
            LogicalColumn::Status => "Status",
            LogicalColumn::ProductDescription => "ProductDescription",
            LogicalColumn::Date => "Date",
            LogicalColumn::SourceFile => "SourceFile",
        }
    }

    /// Parse a logical column name as written in config, e.g. `AssignedTo`
    /// or `assigned_to`.
    pub fn from_name(name: &str) -> Option<Self> {
        let folded = normalize_header(name).replace(' ', "");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().to_lowercase() == folded)
    }
}

impl fmt::Display for LogicalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_\-]+").unwrap());

/// Trim, case-fold, and collapse `_`, `-` and whitespace runs to one space.
pub fn normalize_header(raw: &str) -> String {
    SEPARATORS
        .replace_all(raw.trim(), " ")
        .trim()
        .to_lowercase()
}

const BUILTIN_ALIASES: &[(&str, LogicalColumn)] = &[
    ("assigned to", LogicalColumn::AssignedTo),
    ("assignedto", LogicalColumn::AssignedTo),
    ("allocated to", LogicalColumn::AssignedTo),
    ("assignee", LogicalColumn::AssignedTo),
    ("status", LogicalColumn::Status),
    ("product description", LogicalColumn::ProductDescription),
    ("productdescription", LogicalColumn::ProductDescription),
    ("description", LogicalColumn::ProductDescription),
    ("date", LogicalColumn::Date),
    ("source file", LogicalColumn::SourceFile),
    ("sourcefile", LogicalColumn::SourceFile),
    ("file name", LogicalColumn::SourceFile),
    ("filename", LogicalColumn::SourceFile),
];

/// Normalized header text → logical column.
#[derive(Clone, Debug)]
pub struct AliasTable {
    map: HashMap<String, LogicalColumn>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let map = BUILTIN_ALIASES
            .iter()
            .map(|(alias, col)| (alias.to_string(), *col))
            .collect();
        Self { map }
    }
}

impl AliasTable {
    /// Built-in aliases plus the ones from `config`. Config entries win on
    /// conflict.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let mut table = Self::default();
        for (alias, column) in &config.aliases {
            let logical = LogicalColumn::from_name(column).ok_or_else(|| {
                PipelineError::UnknownLogicalColumn {
                    alias: alias.clone(),
                    column: column.clone(),
                }
            })?;
            table.map.insert(normalize_header(alias), logical);
        }
        Ok(table)
    }

    /// Resolve a raw header. Headers that are not aliases resolve to `None`.
    pub fn resolve(&self, raw_header: &str) -> Option<LogicalColumn> {
        self.map.get(&normalize_header(raw_header)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_folds_case_and_separators() {
        assert_eq!(normalize_header("  PRODUCT_DESCRIPTION "), "product description");
        assert_eq!(normalize_header("File   Name"), "file name");
        assert_eq!(normalize_header("allocated-to"), "allocated to");
        assert_eq!(normalize_header("\tStatus\n"), "status");
    }

    #[test]
    fn builtins_resolve_known_headers() {
        let table = AliasTable::default();
        assert_eq!(table.resolve("ALLOCATED TO"), Some(LogicalColumn::AssignedTo));
        assert_eq!(table.resolve("FILE NAME"), Some(LogicalColumn::SourceFile));
        assert_eq!(
            table.resolve("PRODUCT_DESCRIPTION"),
            Some(LogicalColumn::ProductDescription)
        );
        assert_eq!(table.resolve("AssignedTo"), Some(LogicalColumn::AssignedTo));
        assert_eq!(table.resolve("Remarks"), None);
    }

    #[test]
    fn config_aliases_extend_the_table() -> Result<(), PipelineError> {
        let mut config = Config::default();
        config.aliases.insert("Owner".into(), "assigned_to".into());
        let table = AliasTable::from_config(&config)?;
        assert_eq!(table.resolve(" OWNER "), Some(LogicalColumn::AssignedTo));
        Ok(())
    }

    #[test]
    fn config_alias_to_unknown_column_fails() {
        let mut config = Config::default();
        config.aliases.insert("Owner".into(), "Priority".into());
        let err = AliasTable::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnknownLogicalColumn { ref alias, ref column }
                if alias == "Owner" && column == "Priority"
        ));
    }

    #[test]
    fn logical_names_parse_loosely() {
        assert_eq!(LogicalColumn::from_name("SourceFile"), Some(LogicalColumn::SourceFile));
        assert_eq!(LogicalColumn::from_name("source_file"), Some(LogicalColumn::SourceFile));
        assert_eq!(LogicalColumn::from_name("Product Description"), Some(LogicalColumn::ProductDescription));
        assert_eq!(LogicalColumn::from_name("owner"), None);
    }
}
