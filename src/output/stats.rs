//! Run statistics collected while mirroring
//!
//! Workers bump the counters concurrently; a snapshot is taken once the run
//! is over and rendered by `print_report`.

use crate::output::MirrorReport;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters shared by every worker of a run
#[derive(Debug, Default)]
pub struct RunCounters {
    tasks_completed: AtomicUsize,
    tasks_failed: AtomicUsize,
    tasks_skipped: AtomicUsize,
    resources_fetched: AtomicUsize,
    cache_hits: AtomicUsize,
    documents_rewritten: AtomicUsize,
    links_rewritten: AtomicUsize,
    links_enqueued: AtomicUsize,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A task dropped without network I/O after cancellation
    pub fn task_skipped(&self) {
        self.tasks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one obtained resource, from the network or the store
    pub fn resource_obtained(&self, from_cache: bool) {
        if from_cache {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.resources_fetched.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a document re-saved with `links` rewritten attributes
    pub fn document_rewritten(&self, links: usize) {
        self.documents_rewritten.fetch_add(1, Ordering::Relaxed);
        self.links_rewritten.fetch_add(links, Ordering::Relaxed);
    }

    pub fn link_enqueued(&self) {
        self.links_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks that reached a terminal state or were skipped
    pub fn tasks_finished(&self) -> usize {
        self.tasks_completed.load(Ordering::Relaxed)
            + self.tasks_failed.load(Ordering::Relaxed)
            + self.tasks_skipped.load(Ordering::Relaxed)
    }

    /// Copies the current counter values
    pub fn snapshot(&self) -> RunTotals {
        RunTotals {
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_skipped: self.tasks_skipped.load(Ordering::Relaxed),
            resources_fetched: self.resources_fetched.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            documents_rewritten: self.documents_rewritten.load(Ordering::Relaxed),
            links_rewritten: self.links_rewritten.load(Ordering::Relaxed),
            links_enqueued: self.links_enqueued.load(Ordering::Relaxed),
        }
    }
}

/// Final counter values of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    /// Tasks whose resource was obtained
    pub tasks_completed: usize,

    /// Tasks whose fetch or parse failed
    pub tasks_failed: usize,

    /// Tasks drained without processing after cancellation
    pub tasks_skipped: usize,

    /// Resources downloaded from the network
    pub resources_fetched: usize,

    /// Resources served from the store
    pub cache_hits: usize,

    /// Documents re-saved with rewritten links
    pub documents_rewritten: usize,

    /// Attributes rewritten across all documents
    pub links_rewritten: usize,

    /// Tasks created, including the root
    pub links_enqueued: usize,
}

impl RunTotals {
    /// Total number of tasks the run processed or skipped
    pub fn tasks_total(&self) -> usize {
        self.tasks_completed + self.tasks_failed + self.tasks_skipped
    }
}

/// Prints a run report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &MirrorReport) {
    let totals = &report.totals;

    println!("=== Mirror Report ===\n");

    println!("Run:");
    println!("  Root URL: {}", report.root_url);
    println!("  Output directory: {}", report.output_dir.display());
    println!("  Started: {}", report.started_at.to_rfc3339());
    println!("  Finished: {}", report.finished_at.to_rfc3339());
    println!("  Elapsed: {:.2?}", report.elapsed);
    println!();

    println!("Tasks:");
    println!("  Completed: {}", totals.tasks_completed);
    println!("  Failed: {}", totals.tasks_failed);
    if totals.tasks_skipped > 0 {
        println!("  Skipped: {}", totals.tasks_skipped);
    }
    println!("  Enqueued: {}", totals.links_enqueued);
    println!();

    println!("Resources:");
    println!("  Fetched: {}", totals.resources_fetched);
    println!("  Cache hits: {}", totals.cache_hits);
    println!("  Stored: {}", report.resources_stored);
    println!(
        "  Documents rewritten: {} ({} links)",
        totals.documents_rewritten, totals.links_rewritten
    );

    let secs = report.elapsed.as_secs_f64();
    if secs > 0.0 {
        println!(
            "  Rate: {:.2} resources/sec",
            totals.resources_fetched as f64 / secs
        );
    }
    println!();

    match &report.first_error {
        Some(error) => {
            println!("Errors: {}", report.error_count);
            println!("  First: {}", error);
        }
        None => println!("✓ Mirror completed without errors"),
    }
}
