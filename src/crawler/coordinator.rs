//! Mirror coordinator - main crawl orchestration logic
//!
//! This module ties the crawl together:
//! - Validating the root URL and options before any work starts
//! - Running a fixed pool of workers over the shared task queue
//! - Driving each task through `Queued -> InFlight -> {Completed, Failed}`
//! - Collecting the first error and run statistics into a `MirrorReport`

use crate::config::{validate_options, MirrorOptions};
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::parser::LinkParser;
use crate::crawler::rewriter::{rewrite_document, RewriteOutcome};
use crate::crawler::scheduler::{Scheduler, Task};
use crate::output::{MirrorReport, RunCounters};
use crate::state::TaskState;
use crate::storage::{Resource, ResourceStore};
use crate::url::{validate_root_url, CrawlScope};
use crate::MirrorError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How often (in finished tasks) progress is logged
const PROGRESS_INTERVAL: usize = 25;

/// A configured mirror run
///
/// Construction performs every check that can fail before network I/O, so a
/// `Mirror` that exists can always be run.
pub struct Mirror {
    options: MirrorOptions,
    root: Url,
    fetcher: Fetcher,
    parser: LinkParser,
}

impl Mirror {
    /// Creates a mirror run from options
    ///
    /// # Returns
    ///
    /// * `Ok(Mirror)` - Ready to run
    /// * `Err(MirrorError::InvalidRootUrl)` - The root URL is not absolute http(s)
    /// * `Err(MirrorError::Config)` - An option is out of range
    /// * `Err(MirrorError::Storage)` - The output directory could not be created
    /// * `Err(MirrorError::HttpClient)` - The HTTP client could not be built
    pub fn new(options: MirrorOptions) -> Result<Self, MirrorError> {
        let root = validate_root_url(&options.root_url).map_err(MirrorError::InvalidRootUrl)?;
        validate_options(&options)?;

        let scope = CrawlScope::from_root(&root).map_err(MirrorError::InvalidRootUrl)?;
        let store = Arc::new(ResourceStore::open(&options.output_dir)?);
        let client = build_http_client(&options)?;

        Ok(Self {
            fetcher: Fetcher::new(client, store),
            parser: LinkParser::new(scope),
            root,
            options,
        })
    }

    /// The normalized root URL
    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// The store resources are saved into
    pub fn store(&self) -> &Arc<ResourceStore> {
        self.fetcher.store()
    }

    /// Runs the crawl to completion
    pub async fn run(self) -> MirrorReport {
        self.run_with_cancellation(CancellationToken::new()).await
    }

    /// Runs the crawl until it completes or `cancel` fires
    ///
    /// After cancellation, in-flight fetches return promptly and tasks still
    /// in the queue are drained without network I/O.
    pub async fn run_with_cancellation(self, cancel: CancellationToken) -> MirrorReport {
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let workers = self.options.effective_workers();

        tracing::info!(
            "Mirroring {} (max depth {}, {} workers) into {}",
            self.root,
            self.options.max_depth,
            workers,
            self.options.output_dir.display()
        );

        let run = Arc::new(Run {
            fetcher: self.fetcher,
            parser: self.parser,
            scheduler: Scheduler::new(self.options.queue_capacity),
            max_depth: self.options.max_depth,
            cancel,
            errors: ErrorSink::default(),
            counters: RunCounters::new(),
        });

        run.scheduler.enqueue(self.root.clone(), 0);
        run.counters.link_enqueued();

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let run = Arc::clone(&run);
                tokio::spawn(async move { run.worker(id).await })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        let totals = run.counters.snapshot();
        let (mut first_error, error_count) = run.errors.take();
        if first_error.is_none() && run.cancel.is_cancelled() {
            first_error = Some(MirrorError::Cancelled);
        }

        let report = MirrorReport {
            root_url: self.root.to_string(),
            output_dir: self.options.output_dir,
            started_at,
            finished_at: chrono::Utc::now(),
            elapsed: start.elapsed(),
            totals,
            resources_stored: run.fetcher.store().len(),
            error_count,
            first_error,
        };

        tracing::info!(
            "Mirror finished: {} fetched, {} from cache, {} failed, {} error(s) in {:.2?}",
            totals.resources_fetched,
            totals.cache_hits,
            totals.tasks_failed,
            report.error_count,
            report.elapsed
        );

        report
    }
}

/// Mirrors a site with the given options
///
/// # Example
///
/// ```no_run
/// use site_mirror::{mirror, MirrorOptions};
///
/// # async fn example() -> Result<(), site_mirror::MirrorError> {
/// let options = MirrorOptions::new("https://example.com/");
/// let report = mirror(options).await?;
/// println!("{} resources fetched", report.totals.resources_fetched);
/// # Ok(())
/// # }
/// ```
pub async fn mirror(options: MirrorOptions) -> Result<MirrorReport, MirrorError> {
    Mirror::new(options)?.run().await.into_result()
}

/// State shared by the workers of one run
struct Run {
    fetcher: Fetcher,
    parser: LinkParser,
    scheduler: Scheduler,
    max_depth: u32,
    cancel: CancellationToken,
    errors: ErrorSink,
    counters: RunCounters,
}

impl Run {
    async fn worker(&self, id: usize) {
        tracing::debug!("Worker {} started", id);

        while let Some(task) = self.scheduler.next().await {
            let _done = TaskDone(&self.scheduler);

            match self.process(task).await {
                Some(TaskState::Failed) => self.counters.task_failed(),
                Some(_) => self.counters.task_completed(),
                None => self.counters.task_skipped(),
            }

            let finished = self.counters.tasks_finished();
            if finished % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "Progress: {} tasks done, {} live, {} URLs seen",
                    finished,
                    self.scheduler.live(),
                    self.scheduler.visited()
                );
            }
        }

        tracing::debug!("Worker {} exiting", id);
    }

    /// Drives one task to a terminal state
    ///
    /// Returns `None` when the task was dropped because the run was cancelled.
    async fn process(&self, task: Task) -> Option<TaskState> {
        if self.cancel.is_cancelled() {
            tracing::trace!("Skipping {} after cancellation", task.url);
            return None;
        }

        let mut state = TaskState::Queued;
        advance(&mut state, TaskState::InFlight);
        tracing::debug!("[depth {}] {} {}", task.depth, state, task.url);

        let fetched = match self
            .fetcher
            .fetch_with_cancellation(&task.url, &self.cancel)
            .await
        {
            Ok(fetched) => fetched,
            Err(MirrorError::Cancelled) => return None,
            Err(e) => {
                self.errors.record(e);
                advance(&mut state, TaskState::Failed);
                return Some(state);
            }
        };
        self.counters.resource_obtained(fetched.from_cache);

        let resource = fetched.resource;
        let expandable = resource.is_document && task.depth < self.max_depth;

        if fetched.from_cache && !expandable {
            tracing::debug!("{} already processed", task.url);
        } else if expandable {
            let links = self
                .parser
                .extract_links(&resource.content, &resource.base_url);
            self.expand(&resource, &links, task.depth).await;
        }

        advance(&mut state, TaskState::Completed);
        Some(state)
    }

    /// Rewrites a document and enqueues its links one level deeper
    ///
    /// A failed rewrite is recorded but the links are still enqueued.
    async fn expand(&self, document: &Resource, links: &[Url], depth: u32) {
        match rewrite_document(self.fetcher.store(), &self.parser, document, links).await {
            Ok(RewriteOutcome::Rewritten(count)) => self.counters.document_rewritten(count),
            Ok(RewriteOutcome::Unchanged) => {}
            Err(e) => self.errors.record(e),
        }

        let mut enqueued = 0;
        for link in links {
            if self.scheduler.enqueue(link.clone(), depth + 1) {
                self.counters.link_enqueued();
                enqueued += 1;
            }
        }

        tracing::debug!(
            "{}: {} link(s) found, {} new",
            document.source_url,
            links.len(),
            enqueued
        );
    }
}

/// Moves a task to its next state
fn advance(state: &mut TaskState, next: TaskState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal task transition {} -> {}",
        state,
        next
    );
    *state = next;
}

/// Completes a task when dropped, so the live counter stays exact even if a
/// worker unwinds mid-task
struct TaskDone<'a>(&'a Scheduler);

impl Drop for TaskDone<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

/// Keeps the first error of a run and counts the rest
#[derive(Default)]
struct ErrorSink {
    first: Mutex<Option<MirrorError>>,
    count: AtomicUsize,
}

impl ErrorSink {
    fn record(&self, error: MirrorError) {
        self.count.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("{}", error);

        let mut first = self
            .first
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if first.is_none() {
            *first = Some(error);
        }
    }

    fn take(&self) -> (Option<MirrorError>, usize) {
        let first = self
            .first
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        (first, self.count.load(Ordering::Relaxed))
    }
}
