/// Task state definitions for tracking crawl progress
///
/// Every task moves `Queued -> InFlight -> {Completed, Failed}` exactly once.
use std::fmt;

/// Represents the current state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Task is waiting in the queue
    Queued,

    /// A worker is fetching or expanding the task's URL
    InFlight,

    /// The resource was obtained (and expanded when allowed)
    Completed,

    /// Fetching the resource failed; the branch is not expanded
    Failed,
}

impl TaskState {
    /// Returns true if no further processing will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the task still counts towards the live-task counter
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Queued | Self::InFlight)
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::InFlight)
                | (Self::InFlight, Self::Completed)
                | (Self::InFlight, Self::Failed)
        )
    }

    /// Returns the lowercase name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible task states
    pub fn all_states() -> [TaskState; 4] {
        [Self::Queued, Self::InFlight, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
