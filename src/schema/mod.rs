pub mod alias;
pub mod reconcile;

pub use alias::{normalize_header, AliasTable, LogicalColumn};
pub use reconcile::{reconcile, ColumnMapping, ReconciledSheet};
