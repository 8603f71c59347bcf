//! The value a mirror run returns

use crate::output::stats::RunTotals;
use crate::MirrorError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Summary of a finished mirror run
///
/// Only the first error recorded during the run is kept; every error is
/// logged as it happens and counted in `error_count`.
#[derive(Debug)]
pub struct MirrorReport {
    /// The normalized root URL
    pub root_url: String,

    /// Directory the mirror was written under
    pub output_dir: PathBuf,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// Counter values at the end of the run
    pub totals: RunTotals,

    /// Number of resources registered in the store
    pub resources_stored: usize,

    /// Number of errors observed across all tasks
    pub error_count: usize,

    /// The first error observed, if any
    pub first_error: Option<MirrorError>,
}

impl MirrorReport {
    /// Returns true if no error was recorded
    pub fn is_success(&self) -> bool {
        self.first_error.is_none()
    }

    /// Converts the report into the run's terminal result
    ///
    /// # Returns
    ///
    /// * `Ok(MirrorReport)` - The run recorded no error
    /// * `Err(MirrorError)` - The first error recorded during the run
    pub fn into_result(mut self) -> Result<Self, MirrorError> {
        match self.first_error.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}
