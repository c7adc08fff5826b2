use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::FromRow;
use uuid::Uuid;

/// Audit row for one task status change. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskTransition {
    pub id: Uuid,
    pub task_id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub event: String,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TaskTransition {
    pub async fn insert<'e, E>(executor: E, transition: &TaskTransition) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO task_transitions (id, task_id, from_status, to_status, event, actor_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(transition.id)
        .bind(transition.task_id)
        .bind(&transition.from_status)
        .bind(&transition.to_status)
        .bind(&transition.event)
        .bind(transition.actor_id)
        .bind(transition.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Transition history for a task, oldest first.
    pub async fn list_for_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<TaskTransition>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TaskTransition>(
            r#"
            SELECT id, task_id, from_status, to_status, event, actor_id, created_at
            FROM task_transitions
            WHERE task_id = $1
            ORDER BY seq
            "#,
        )
        .bind(task_id)
        .fetch_all(executor)
        .await
    }
}
