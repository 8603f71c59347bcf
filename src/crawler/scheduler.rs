//! Scheduler for the crawl's shared work queue
//!
//! This module handles:
//! - The visited set guaranteeing each URL is enqueued once per run
//! - A bounded FIFO task queue shared by every worker
//! - The live-task counter that closes the queue when the crawl is done
//!
//! A task counts as live from the moment it is pushed until the worker that
//! pulled it calls `complete`. Children are always pushed before their parent
//! completes, so the counter can only reach zero once no work remains.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Normalized URL to fetch
    pub url: Url,

    /// Number of link hops from the root
    pub depth: u32,
}

/// Set of URL identities already enqueued during a run
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    /// Creates an empty visited set
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `url` as visited
    ///
    /// Returns true if the URL was not seen before. The check and the insert
    /// happen under one lock acquisition.
    pub fn insert(&self, url: &Url) -> bool {
        self.lock().insert(url.as_str().to_string())
    }

    /// Returns true if `url` has already been enqueued
    pub fn contains(&self, url: &Url) -> bool {
        self.lock().contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forgets every URL; only meaningful between separate runs
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.urls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bounded task queue paired with a live-task counter
#[derive(Debug)]
pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Task>>,
    live: AtomicUsize,
    idle: CancellationToken,
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` waiting tasks
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            live: AtomicUsize::new(0),
            idle: CancellationToken::new(),
        }
    }

    /// Pushes a task and counts it as live
    ///
    /// When the queue is full the send is handed to a spawned task, so a
    /// worker that is also the only consumer never blocks on its own queue.
    /// The capacity therefore bounds the channel, not the number of pending
    /// tasks: overflow waits in those spawned sends, and their number is not
    /// capped. It is bounded in practice by the visited set, since each URL
    /// is pushed at most once. Must be called from within a tokio runtime.
    pub fn push(&self, task: Task) {
        self.live.fetch_add(1, Ordering::AcqRel);

        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                tracing::trace!("Task queue full, deferring {}", task.url);
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    if let Err(e) = sender.send(task).await {
                        tracing::debug!("Dropped task for {}: queue closed", e.0.url);
                    }
                });
            }
            Err(TrySendError::Closed(task)) => {
                tracing::debug!("Dropped task for {}: queue closed", task.url);
                self.complete();
            }
        }
    }

    /// Waits for the next task
    ///
    /// Returns `None` once every live task has completed.
    pub async fn next(&self) -> Option<Task> {
        let mut receiver = tokio::select! {
            biased;
            _ = self.idle.cancelled() => return None,
            receiver = self.receiver.lock() => receiver,
        };

        tokio::select! {
            biased;
            _ = self.idle.cancelled() => None,
            task = receiver.recv() => task,
        }
    }

    /// Marks one task as finished
    ///
    /// The call that brings the live count to zero closes the queue.
    pub fn complete(&self) {
        if self.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            tracing::debug!("No live tasks left, closing queue");
            self.idle.cancel();
        }
    }

    /// Number of queued or in-flight tasks
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Returns true once the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.idle.is_cancelled()
    }
}

/// Combines the visited set and the task queue
#[derive(Debug)]
pub struct Scheduler {
    visited: VisitedSet,
    queue: TaskQueue,
}

impl Scheduler {
    /// Creates a scheduler whose queue holds at most `capacity` waiting tasks
    pub fn new(capacity: usize) -> Self {
        Self {
            visited: VisitedSet::new(),
            queue: TaskQueue::new(capacity),
        }
    }

    /// Enqueues `url` at `depth` unless it was enqueued before
    ///
    /// # Returns
    ///
    /// * `true` - A new task was created
    /// * `false` - The URL is already in the visited set
    pub fn enqueue(&self, url: Url, depth: u32) -> bool {
        if !self.visited.insert(&url) {
            tracing::trace!("Already visited {}", url);
            return false;
        }

        self.queue.push(Task { url, depth });
        true
    }

    /// Waits for the next task; `None` means the crawl is done
    pub async fn next(&self) -> Option<Task> {
        self.queue.next().await
    }

    /// Marks a task pulled with `next` as finished
    pub fn complete(&self) {
        self.queue.complete();
    }

    /// Number of queued or in-flight tasks
    pub fn live(&self) -> usize {
        self.queue.live()
    }

    /// Number of distinct URLs enqueued so far
    pub fn visited(&self) -> usize {
        self.visited.len()
    }
}
