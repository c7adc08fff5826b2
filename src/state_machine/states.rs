use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
///
/// ```text
/// created -> assigned -> in_progress -> completed -> archived
///    \__________\______________\______> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state when the task is created
    #[default]
    Created,
    /// A technician has been assigned
    Assigned,
    /// Work has started
    InProgress,
    /// Work finished; eligible for archival after the retention window
    Completed,
    /// Abandoned; never archived
    Cancelled,
    /// Completed work moved out of the active set
    Archived,
}

crate::text_enum!(TaskStatus, "task status" {
    Created => "created",
    Assigned => "assigned",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    Archived => "archived",
});

impl TaskStatus {
    /// Statuses that still count as live work for recurrence dedup.
    pub const LIVE: &'static [TaskStatus] = &[Self::Created, Self::Assigned, Self::InProgress];

    /// Check if this is a terminal state (no user-driven transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Archived)
    }

    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }

    /// Text forms of [`TaskStatus::LIVE`], for binding into `= ANY($n)` filters.
    pub fn live_texts() -> Vec<&'static str> {
        Self::LIVE.iter().map(|s| s.as_str()).collect()
    }
}
