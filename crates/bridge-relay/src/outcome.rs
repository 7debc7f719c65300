use std::time::Duration;

/// Result of one attempt at relaying an event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskOutcome {
    /// Nothing more to do, either the msg was broadcast or the event was
    /// already applied.
    Committed,

    /// Run the task again after the delay.
    RetryAfter(Duration),

    /// The task can never succeed and is dropped.
    Failed(String),
}

impl TaskOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}
