use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events that can trigger task status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Hand the task to a technician (also used to reassign)
    Assign {
        #[serde(rename = "assigneeId")]
        assignee_id: Uuid,
    },
    /// Technician starts working
    Start,
    /// Work is done
    Complete,
    /// Abandon the task
    Cancel,
    /// Retention moves old completed work out of the active set
    Archive,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Assign { .. } => "assign",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Archive => "archive",
        }
    }

    /// Events that only the retention job may issue.
    pub fn is_system_only(&self) -> bool {
        matches!(self, Self::Archive)
    }
}
