//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: lifecycle of a single crawl task (queued, in flight, completed, failed)

mod task_state;

pub use task_state::TaskState;
