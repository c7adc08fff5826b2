use super::events::TaskEvent;
use super::guards::{RequiredStepsCompleteGuard, StateGuard};
use super::states::TaskStatus;
use crate::clock::Clock;
use crate::error::{FleetError, Result};
use crate::logging::log_task_operation;
use crate::models::{Task, TaskTransition};
use crate::constants::entities;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// Applies lifecycle events to tasks.
///
/// Every transition locks the task row, re-validates against the current
/// status, writes the new lifecycle columns and appends a `task_transitions`
/// row, all in one transaction.
#[derive(Clone)]
pub struct TaskStateMachine {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TaskStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStateMachine")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl TaskStateMachine {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Determine the target status for an event, or reject it.
    pub fn determine_target(current: TaskStatus, event: &TaskEvent) -> Result<TaskStatus> {
        let target = match (current, event) {
            // Assignment, including reassignment before work starts
            (TaskStatus::Created, TaskEvent::Assign { .. }) => TaskStatus::Assigned,
            (TaskStatus::Assigned, TaskEvent::Assign { .. }) => TaskStatus::Assigned,

            (TaskStatus::Assigned, TaskEvent::Start) => TaskStatus::InProgress,
            (TaskStatus::InProgress, TaskEvent::Complete) => TaskStatus::Completed,

            // Cancel transitions
            (TaskStatus::Created, TaskEvent::Cancel) => TaskStatus::Cancelled,
            (TaskStatus::Assigned, TaskEvent::Cancel) => TaskStatus::Cancelled,
            (TaskStatus::InProgress, TaskEvent::Cancel) => TaskStatus::Cancelled,

            (TaskStatus::Completed, TaskEvent::Archive) => TaskStatus::Archived,

            (from, _) => {
                return Err(FleetError::InvalidTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Apply `event` to the task in its own transaction.
    pub async fn transition(
        &self,
        task_id: Uuid,
        event: TaskEvent,
        actor_id: Option<Uuid>,
    ) -> Result<Task> {
        let mut tx = self.pool.begin().await?;
        let mut task = Task::lock_for_update(&mut tx, task_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::TASK, task_id))?;

        Self::apply(&mut tx, &mut task, &event, actor_id, self.clock.now()).await?;
        tx.commit().await?;

        Ok(task)
    }

    /// Apply `event` to an already locked task inside the caller's transaction.
    pub async fn apply(
        conn: &mut PgConnection,
        task: &mut Task,
        event: &TaskEvent,
        actor_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<TaskTransition> {
        let from = task.status;
        let target = Self::determine_target(from, event)?;

        if target == TaskStatus::Completed {
            RequiredStepsCompleteGuard.check(task, &mut *conn).await?;
        }

        task.status = target;
        task.updated_at = now;
        match (target, event) {
            (_, TaskEvent::Assign { assignee_id }) => task.assigned_to = Some(*assignee_id),
            (TaskStatus::Completed, _) => task.completed_at = Some(now),
            (TaskStatus::Archived, _) => task.archived_at = Some(now),
            _ => {}
        }
        Task::save_lifecycle(&mut *conn, task).await?;

        let transition = TaskTransition {
            id: Uuid::new_v4(),
            task_id: task.id,
            from_status: Some(from.to_string()),
            to_status: target.to_string(),
            event: event.event_type().to_string(),
            actor_id,
            created_at: now,
        };
        TaskTransition::insert(&mut *conn, &transition).await?;

        log_task_operation(
            event.event_type(),
            task.id,
            task.task_type.as_str(),
            target.as_str(),
            None,
        );

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign() -> TaskEvent {
        TaskEvent::Assign {
            assignee_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert_eq!(
            TaskStateMachine::determine_target(TaskStatus::Created, &assign()).unwrap(),
            TaskStatus::Assigned
        );
        assert_eq!(
            TaskStateMachine::determine_target(TaskStatus::Assigned, &assign()).unwrap(),
            TaskStatus::Assigned
        );
        assert_eq!(
            TaskStateMachine::determine_target(TaskStatus::Assigned, &TaskEvent::Start).unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!(
            TaskStateMachine::determine_target(TaskStatus::InProgress, &TaskEvent::Complete)
                .unwrap(),
            TaskStatus::Completed
        );
        assert_eq!(
            TaskStateMachine::determine_target(TaskStatus::Completed, &TaskEvent::Archive)
                .unwrap(),
            TaskStatus::Archived
        );
    }

    #[test]
    fn test_cancel_from_every_live_status() {
        for status in TaskStatus::LIVE {
            assert_eq!(
                TaskStateMachine::determine_target(*status, &TaskEvent::Cancel).unwrap(),
                TaskStatus::Cancelled
            );
        }
    }

    #[test]
    fn test_forward_skips_are_rejected() {
        assert!(TaskStateMachine::determine_target(TaskStatus::Created, &TaskEvent::Start).is_err());
        assert!(
            TaskStateMachine::determine_target(TaskStatus::Created, &TaskEvent::Complete).is_err()
        );
        assert!(
            TaskStateMachine::determine_target(TaskStatus::Assigned, &TaskEvent::Complete).is_err()
        );
        assert!(
            TaskStateMachine::determine_target(TaskStatus::InProgress, &TaskEvent::Archive)
                .is_err()
        );
    }

    #[test]
    fn test_terminal_statuses_reject_everything_but_archival_of_completed() {
        let events = [
            assign(),
            TaskEvent::Start,
            TaskEvent::Complete,
            TaskEvent::Cancel,
            TaskEvent::Archive,
        ];

        for status in [TaskStatus::Cancelled, TaskStatus::Archived] {
            for event in &events {
                let err = TaskStateMachine::determine_target(status, event).unwrap_err();
                assert_eq!(err.error_code(), "INVALID_TRANSITION");
            }
        }

        for event in events.iter().filter(|e| !matches!(e, TaskEvent::Archive)) {
            assert!(TaskStateMachine::determine_target(TaskStatus::Completed, event).is_err());
        }
    }
}
