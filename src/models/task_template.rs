use super::template_checklist::{TemplateChecklist, TemplateChecklistWithSteps, TemplateStep};
use crate::constants::{TaskPriority, TaskType};
use crate::models::pagination::PageRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use uuid::Uuid;

/// A reusable definition of a checklist/step hierarchy used to stamp out tasks.
/// Maps to the `task_templates` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub task_type: TaskType,
    #[sqlx(try_from = "String")]
    pub default_priority: TaskPriority,
    pub estimated_duration_minutes: i32,
    pub is_active: bool,
    /// Bumped whenever the checklist structure is replaced
    pub version: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Template with its ordered checklist tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplateWithChecklists {
    #[serde(flatten)]
    pub template: TaskTemplate,
    pub checklists: Vec<TemplateChecklistWithSteps>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFilter {
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub is_active: Option<bool>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub by_type: HashMap<String, i64>,
    pub instantiated_tasks: i64,
}

const TEMPLATE_COLUMNS: &str = "id, name, description, task_type, default_priority, \
    estimated_duration_minutes, is_active, version, created_by, created_at, updated_at";

impl TaskTemplate {
    pub async fn insert<'e, E>(executor: E, template: &TaskTemplate) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO task_templates (id, name, description, task_type, default_priority,
                estimated_duration_minutes, is_active, version, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.task_type.as_str())
        .bind(template.default_priority.as_str())
        .bind(template.estimated_duration_minutes)
        .bind(template.is_active)
        .bind(template.version)
        .bind(template.created_by)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<TaskTemplate>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TaskTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM task_templates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Load and row-lock a template for the rest of the transaction.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<TaskTemplate>, sqlx::Error> {
        sqlx::query_as::<_, TaskTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM task_templates WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Share-lock a template so its checklist tree cannot be replaced while it
    /// is being copied.
    pub async fn lock_for_share(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<TaskTemplate>, sqlx::Error> {
        sqlx::query_as::<_, TaskTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM task_templates WHERE id = $1 FOR SHARE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Most recently updated active template with the given name.
    pub async fn find_active_by_name<'e, E>(
        executor: E,
        name: &str,
    ) -> Result<Option<TaskTemplate>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TaskTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM task_templates \
             WHERE name = $1 AND is_active \
             ORDER BY updated_at DESC, id \
             LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    /// Filtered page of templates plus the total matching count.
    pub async fn list(
        conn: &mut PgConnection,
        filter: &TemplateFilter,
        page: PageRequest,
    ) -> Result<(Vec<TaskTemplate>, i64), sqlx::Error> {
        let name_pattern = filter
            .name
            .as_deref()
            .map(crate::models::pagination::contains_pattern);
        let task_type = filter.task_type.map(|t| t.as_str());

        let templates = sqlx::query_as::<_, TaskTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM task_templates \
             WHERE ($1::text IS NULL OR task_type = $1) \
               AND ($2::boolean IS NULL OR is_active = $2) \
               AND ($3::text IS NULL OR name ILIKE $3) \
             ORDER BY name, created_at \
             LIMIT $4 OFFSET $5"
        ))
        .bind(task_type)
        .bind(filter.is_active)
        .bind(&name_pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM task_templates
            WHERE ($1::text IS NULL OR task_type = $1)
              AND ($2::boolean IS NULL OR is_active = $2)
              AND ($3::text IS NULL OR name ILIKE $3)
            "#,
        )
        .bind(task_type)
        .bind(filter.is_active)
        .bind(&name_pattern)
        .fetch_one(&mut *conn)
        .await?;

        Ok((templates, total))
    }

    /// Persist the mutable header columns of a template.
    pub async fn update<'e, E>(executor: E, template: &TaskTemplate) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE task_templates
            SET name = $2, description = $3, task_type = $4, default_priority = $5,
                estimated_duration_minutes = $6, is_active = $7, version = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.task_type.as_str())
        .bind(template.default_priority.as_str())
        .bind(template.estimated_duration_minutes)
        .bind(template.is_active)
        .bind(template.version)
        .bind(template.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM task_templates WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of tasks (of any status) instantiated from this template.
    pub async fn count_referencing_tasks<'e, E>(executor: E, id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE template_id = $1")
            .bind(id)
            .fetch_one(executor)
            .await
    }

    /// Attach the ordered checklist tree to a template.
    pub async fn load_tree(
        conn: &mut PgConnection,
        template: TaskTemplate,
    ) -> Result<TaskTemplateWithChecklists, sqlx::Error> {
        let checklists = TemplateChecklist::list_for_template(&mut *conn, template.id).await?;
        let checklist_ids: Vec<Uuid> = checklists.iter().map(|c| c.id).collect();
        let steps = TemplateStep::list_for_checklists(&mut *conn, &checklist_ids).await?;

        let mut steps_by_checklist: HashMap<Uuid, Vec<TemplateStep>> = HashMap::new();
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
                TemplateChecklistWithSteps { checklist, steps }
            })
            .collect();

        Ok(TaskTemplateWithChecklists {
            template,
            checklists,
        })
    }

    pub async fn stats(conn: &mut PgConnection) -> Result<TemplateStats, sqlx::Error> {
        let (total, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM task_templates",
        )
        .fetch_one(&mut *conn)
        .await?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT task_type, COUNT(*) FROM task_templates GROUP BY task_type ORDER BY task_type",
        )
        .fetch_all(&mut *conn)
        .await?;

        let instantiated_tasks: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE template_id IS NOT NULL")
                .fetch_one(&mut *conn)
                .await?;

        Ok(TemplateStats {
            total,
            active,
            inactive: total - active,
            by_type: by_type.into_iter().collect(),
            instantiated_tasks,
        })
    }
}
