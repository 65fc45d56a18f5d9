//! Dedup / aggregation sink and reporting
//!
//! Collapses duplicate products into canonical records, accumulates crawl
//! statistics, and renders the operator-facing report.

mod dedup;
mod report;
mod stats;

pub use dedup::{IngestOutcome, ProductSink, SharedCheckpoint};
pub use report::{format_report, write_report};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
