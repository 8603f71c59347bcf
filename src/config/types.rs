use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default crawl depth when none is given
pub const DEFAULT_MAX_DEPTH: u32 = 1;

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "./downloads";

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 5;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default capacity of the bounded task queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Options for a single mirror run
///
/// These are fixed for the lifetime of a run. `workers` below 1 is treated as 1.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorOptions {
    /// Absolute http(s) URL the crawl starts from
    pub root_url: String,

    /// Number of link hops followed from the root
    pub max_depth: u32,

    /// Directory the mirrored tree is written under
    pub output_dir: PathBuf,

    /// Number of concurrent workers
    pub workers: usize,

    /// Per-request timeout
    pub timeout: Duration,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Capacity of the bounded task queue
    pub queue_capacity: usize,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            root_url: String::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            workers: DEFAULT_WORKERS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("site-mirror/{}", env!("CARGO_PKG_VERSION")),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MirrorOptions {
    /// Creates options for the given root URL with all other fields defaulted
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            ..Self::default()
        }
    }

    /// Overlays every value present in a configuration file onto these options
    pub fn merge_file(mut self, file: &FileConfig) -> Self {
        let section = &file.mirror;

        if let Some(root_url) = &section.root_url {
            self.root_url = root_url.clone();
        }
        if let Some(max_depth) = section.max_depth {
            self.max_depth = max_depth;
        }
        if let Some(output_dir) = &section.output_dir {
            self.output_dir = PathBuf::from(output_dir);
        }
        if let Some(workers) = section.workers {
            self.workers = workers;
        }
        if let Some(timeout_secs) = section.timeout_secs {
            self.timeout = Duration::from_secs(timeout_secs);
        }
        if let Some(queue_capacity) = section.queue_capacity {
            self.queue_capacity = queue_capacity;
        }
        if let Some(user_agent) = &section.user_agent {
            self.user_agent = user_agent.clone();
        }

        self
    }

    /// Worker count actually used by the orchestrator (never below 1)
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

/// Contents of a TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub mirror: MirrorSection,
}

/// The `[mirror]` table; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MirrorSection {
    /// Root URL to mirror
    pub root_url: Option<String>,

    /// Maximum depth to follow links
    pub max_depth: Option<u32>,

    /// Output directory
    pub output_dir: Option<String>,

    /// Number of concurrent workers
    pub workers: Option<usize>,

    /// Per-request timeout (seconds)
    pub timeout_secs: Option<u64>,

    /// Capacity of the bounded task queue
    pub queue_capacity: Option<usize>,

    /// User-Agent header value
    pub user_agent: Option<String>,
}
