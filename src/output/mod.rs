//! Output module for run reports
//!
//! This module handles:
//! - Counting task and resource outcomes while a run is in progress
//! - The `MirrorReport` a finished run returns
//! - Rendering a report to the console

mod report;
pub mod stats;

pub use report::MirrorReport;
pub use stats::{print_report, RunCounters, RunTotals};
