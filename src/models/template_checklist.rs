use crate::constants::StepType;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::FromRow;
use uuid::Uuid;

/// Checklist definition belonging to a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TemplateChecklist {
    pub id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_required: bool,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

/// Step definition belonging to a template checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStep {
    pub id: Uuid,
    pub checklist_id: Uuid,
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
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateChecklistWithSteps {
    #[serde(flatten)]
    pub checklist: TemplateChecklist,
    pub steps: Vec<TemplateStep>,
}

impl TemplateChecklist {
    pub async fn insert<'e, E>(executor: E, checklist: &TemplateChecklist) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO template_checklists (id, template_id, name, description, is_required, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(checklist.id)
        .bind(checklist.template_id)
        .bind(&checklist.name)
        .bind(&checklist.description)
        .bind(checklist.is_required)
        .bind(checklist.sort_order)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_for_template<'e, E>(
        executor: E,
        template_id: Uuid,
    ) -> Result<Vec<TemplateChecklist>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TemplateChecklist>(
            r#"
            SELECT id, template_id, name, description, is_required, sort_order
            FROM template_checklists
            WHERE template_id = $1
            ORDER BY sort_order
            "#,
        )
        .bind(template_id)
        .fetch_all(executor)
        .await
    }

    /// Remove a template's checklists; steps go with them via cascade.
    pub async fn delete_for_template<'e, E>(executor: E, template_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM template_checklists WHERE template_id = $1")
            .bind(template_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

impl TemplateStep {
    pub async fn insert<'e, E>(executor: E, step: &TemplateStep) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO template_steps (id, checklist_id, name, description, sort_order, step_type,
                is_required, requires_photo, requires_note, validation_rules)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(step.id)
        .bind(step.checklist_id)
        .bind(&step.name)
        .bind(&step.description)
        .bind(step.sort_order)
        .bind(step.step_type.as_str())
        .bind(step.is_required)
        .bind(step.requires_photo)
        .bind(step.requires_note)
        .bind(&step.validation_rules)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Steps of the given checklists, grouped by checklist and ordered within it.
    pub async fn list_for_checklists<'e, E>(
        executor: E,
        checklist_ids: &[Uuid],
    ) -> Result<Vec<TemplateStep>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TemplateStep>(
            r#"
            SELECT id, checklist_id, name, description, sort_order, step_type,
                   is_required, requires_photo, requires_note, validation_rules
            FROM template_steps
            WHERE checklist_id = ANY($1)
            ORDER BY checklist_id, sort_order
            "#,
        )
        .bind(checklist_ids)
        .fetch_all(executor)
        .await
    }
}
