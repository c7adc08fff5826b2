use crate::constants::StepType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// A task's private copy of a template checklist.
///
/// `template_checklist_id` is a traceability back-reference only; it carries no
/// foreign key and the template may be edited or deleted independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskChecklist {
    pub id: Uuid,
    pub task_id: Uuid,
    pub template_checklist_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub is_required: bool,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub id: Uuid,
    pub checklist_id: Uuid,
    pub template_step_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i32,
    #[sqlx(try_from = "String")]
    pub step_type: StepType,
    pub is_required: bool,
    pub requires_photo: bool,
    pub requires_note: bool,
    pub validation_rules: Option<serde_json::Value>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub note: Option<String>,
    pub photo_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskChecklistWithSteps {
    #[serde(flatten)]
    pub checklist: TaskChecklist,
    pub steps: Vec<TaskStep>,
}

const STEP_COLUMNS: &str = "s.id, s.checklist_id, s.template_step_id, s.name, s.description, \
    s.sort_order, s.step_type, s.is_required, s.requires_photo, s.requires_note, \
    s.validation_rules, s.is_completed, s.completed_at, s.completed_by, s.note, s.photo_ref";

impl TaskChecklist {
    pub async fn insert<'e, E>(executor: E, checklist: &TaskChecklist) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO task_checklists (id, task_id, template_checklist_id, name, description,
                is_required, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(checklist.id)
        .bind(checklist.task_id)
        .bind(checklist.template_checklist_id)
        .bind(&checklist.name)
        .bind(&checklist.description)
        .bind(checklist.is_required)
        .bind(checklist.sort_order)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_for_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<TaskChecklist>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TaskChecklist>(
            r#"
            SELECT id, task_id, template_checklist_id, name, description, is_required, sort_order
            FROM task_checklists
            WHERE task_id = $1
            ORDER BY sort_order
            "#,
        )
        .bind(task_id)
        .fetch_all(executor)
        .await
    }
}

impl TaskStep {
    pub async fn insert<'e, E>(executor: E, step: &TaskStep) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO task_steps (id, checklist_id, template_step_id, name, description,
                sort_order, step_type, is_required, requires_photo, requires_note,
                validation_rules, is_completed, completed_at, completed_by, note, photo_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(step.id)
        .bind(step.checklist_id)
        .bind(step.template_step_id)
        .bind(&step.name)
        .bind(&step.description)
        .bind(step.sort_order)
        .bind(step.step_type.as_str())
        .bind(step.is_required)
        .bind(step.requires_photo)
        .bind(step.requires_note)
        .bind(&step.validation_rules)
        .bind(step.is_completed)
        .bind(step.completed_at)
        .bind(step.completed_by)
        .bind(&step.note)
        .bind(&step.photo_ref)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_for_checklists<'e, E>(
        executor: E,
        checklist_ids: &[Uuid],
    ) -> Result<Vec<TaskStep>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TaskStep>(&format!(
            "SELECT {STEP_COLUMNS} FROM task_steps s \
             WHERE s.checklist_id = ANY($1) \
             ORDER BY s.checklist_id, s.sort_order"
        ))
        .bind(checklist_ids)
        .fetch_all(executor)
        .await
    }

    /// Lock a step, but only if it belongs to the given task.
    pub async fn lock_for_task(
        conn: &mut PgConnection,
        task_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<TaskStep>, sqlx::Error> {
        sqlx::query_as::<_, TaskStep>(&format!(
            "SELECT {STEP_COLUMNS} FROM task_steps s \
             JOIN task_checklists c ON c.id = s.checklist_id \
             WHERE c.task_id = $1 AND s.id = $2 \
             FOR UPDATE OF s"
        ))
        .bind(task_id)
        .bind(step_id)
        .fetch_optional(conn)
        .await
    }

    /// Persist the completion columns of a step.
    pub async fn save_completion<'e, E>(executor: E, step: &TaskStep) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE task_steps
            SET is_completed = $2, completed_at = $3, completed_by = $4, note = $5, photo_ref = $6
            WHERE id = $1
            "#,
        )
        .bind(step.id)
        .bind(step.is_completed)
        .bind(step.completed_at)
        .bind(step.completed_by)
        .bind(&step.note)
        .bind(&step.photo_ref)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Required steps (in required checklists) not yet completed.
    pub async fn count_open_required<'e, E>(executor: E, task_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM task_steps s
            JOIN task_checklists c ON c.id = s.checklist_id
            WHERE c.task_id = $1 AND c.is_required AND s.is_required AND NOT s.is_completed
            "#,
        )
        .bind(task_id)
        .fetch_one(executor)
        .await
    }
}
