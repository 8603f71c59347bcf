//! Crawler module for mirroring a site
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching through the resource store
//! - HTML link extraction and normalization
//! - Rewriting saved documents to reference local paths
//! - The shared task queue and visited set
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod parser;
mod rewriter;
mod scheduler;

pub use coordinator::{mirror, Mirror};
pub use fetcher::{build_http_client, Fetched, Fetcher};
pub use parser::{link_attributes_for, parse_srcset, LinkParser, LINK_ATTRIBUTES};
pub use rewriter::{rewrite_document, DocumentRewriter, RewriteOutcome};
pub use scheduler::{Scheduler, Task, TaskQueue, VisitedSet};
