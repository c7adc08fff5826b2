use super::task_checklist::{TaskChecklist, TaskChecklistWithSteps, TaskStep};
use crate::constants::{TaskPriority, TaskStatus, TaskType};
use crate::database::error_codes::{database_error_details, PgErrorCode};
use crate::error::{FleetError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use uuid::Uuid;

/// Name of the partial unique index guarding live recurring tasks.
pub const LIVE_RECURRENCE_CONSTRAINT: &str = "idx_tasks_live_recurrence";

/// A unit of field or warehouse work. Maps to the `tasks` table.
///
/// `recurrence_scope` is set only for scheduler-generated work: the machine id
/// for machine-scoped policies, or `warehouse` for global ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub task_type: TaskType,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    #[sqlx(try_from = "String")]
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub template_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub recurrence_scope: Option<String>,
    pub estimated_duration_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Task with its privately owned checklist tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithChecklists {
    #[serde(flatten)]
    pub task: Task,
    pub checklists: Vec<TaskChecklistWithSteps>,
}

const TASK_COLUMNS: &str = "id, title, description, task_type, status, priority, due_date, \
    template_id, machine_id, assigned_to, created_by, recurrence_scope, \
    estimated_duration_minutes, created_at, updated_at, completed_at, archived_at";

impl Task {
    /// Insert a task row.
    ///
    /// A collision on the live-recurrence index surfaces as
    /// [`FleetError::DuplicateRecurringTask`] so callers can treat it as
    /// "already scheduled".
    pub async fn insert<'e, E>(executor: E, task: &Task) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, task_type, status, priority, due_date,
                template_id, machine_id, assigned_to, created_by, recurrence_scope,
                estimated_duration_minutes, created_at, updated_at, completed_at, archived_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(task.template_id)
        .bind(task.machine_id)
        .bind(task.assigned_to)
        .bind(task.created_by)
        .bind(&task.recurrence_scope)
        .bind(task.estimated_duration_minutes)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .bind(task.archived_at)
        .execute(executor)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match database_error_details(&err) {
                Some((code, Some(constraint)))
                    if PgErrorCode::is_unique_violation(&code)
                        && constraint == LIVE_RECURRENCE_CONSTRAINT =>
                {
                    Err(FleetError::DuplicateRecurringTask {
                        task_type: task.task_type.to_string(),
                        scope: task.recurrence_scope.clone().unwrap_or_default(),
                    })
                }
                _ => Err(err.into()),
            },
        }
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> std::result::Result<Option<Task>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Load and row-lock a task so concurrent transitions serialize on it.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> std::result::Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// The live recurring task occupying `(task_type, scope)`, if any.
    pub async fn find_live_recurring<'e, E>(
        executor: E,
        task_type: TaskType,
        scope: &str,
    ) -> std::result::Result<Option<Task>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE task_type = $1 AND recurrence_scope = $2 AND status = ANY($3) \
             ORDER BY created_at DESC \
             LIMIT 1"
        ))
        .bind(task_type.as_str())
        .bind(scope)
        .bind(TaskStatus::live_texts())
        .fetch_optional(executor)
        .await
    }

    /// One page of completed tasks last touched before `cutoff`, oldest first.
    ///
    /// Keyset pagination on `(updated_at, id)`: pass the last row of the
    /// previous page as `after` to continue past it.
    pub async fn list_completed_before<'e, E>(
        executor: E,
        cutoff: DateTime<Utc>,
        after: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> std::result::Result<Vec<(DateTime<Utc>, Uuid)>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (after_updated_at, after_id) = after.unzip();
        sqlx::query_as(
            r#"
            SELECT updated_at, id FROM tasks
            WHERE status = $1 AND updated_at < $2
              AND ($3::timestamptz IS NULL OR (updated_at, id) > ($3, $4::uuid))
            ORDER BY updated_at, id
            LIMIT $5
            "#,
        )
        .bind(TaskStatus::Completed.as_str())
        .bind(cutoff)
        .bind(after_updated_at)
        .bind(after_id)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    /// Persist the lifecycle columns after a transition.
    pub async fn save_lifecycle<'e, E>(executor: E, task: &Task) -> std::result::Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, assigned_to = $3, updated_at = $4, completed_at = $5, archived_at = $6
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(task.status.as_str())
        .bind(task.assigned_to)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .bind(task.archived_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Attach the ordered checklist tree to a task.
    pub async fn load_tree(
        conn: &mut PgConnection,
        task: Task,
    ) -> std::result::Result<TaskWithChecklists, sqlx::Error> {
        let checklists = TaskChecklist::list_for_task(&mut *conn, task.id).await?;
        let checklist_ids: Vec<Uuid> = checklists.iter().map(|c| c.id).collect();
        let steps = TaskStep::list_for_checklists(&mut *conn, &checklist_ids).await?;

        let mut steps_by_checklist: HashMap<Uuid, Vec<TaskStep>> = HashMap::new();
        for step in steps {
            steps_by_checklist
                .entry(step.checklist_id)
                .or_default()
                .push(step);
        }

        let checklists = checklists
            .into_iter()
            .map(|checklist| {
                let steps = steps_by_checklist.remove(&checklist.id).unwrap_or_default();
                TaskChecklistWithSteps { checklist, steps }
            })
            .collect();

        Ok(TaskWithChecklists { task, checklists })
    }
}
