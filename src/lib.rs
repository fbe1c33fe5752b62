pub mod aggregate;
pub mod canonical;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod metrics;
pub mod pipeline;
pub mod rollup;
pub mod schema;
pub mod sheet;
pub mod table;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{run_batch, BatchReport, Outcome, Summary};
pub use table::{SummaryRow, SummaryTable};
