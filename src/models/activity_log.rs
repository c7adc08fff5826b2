use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::FromRow;
use uuid::Uuid;

/// Traceability row written alongside bin-level changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity: String,
    pub entity_id: Uuid,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        actor_id: Option<Uuid>,
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: Uuid,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            action: action.into(),
            entity: entity.into(),
            entity_id,
            metadata,
            created_at: now,
        }
    }

    pub async fn insert<'e, E>(executor: E, entry: &ActivityLogEntry) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO activity_log (id, actor_id, action, entity, entity_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.entity)
        .bind(entry.entity_id)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_for_entity<'e, E>(
        executor: E,
        entity: &str,
        entity_id: Uuid,
    ) -> Result<Vec<ActivityLogEntry>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ActivityLogEntry>(
            r#"
            SELECT id, actor_id, action, entity, entity_id, metadata, created_at
            FROM activity_log
            WHERE entity = $1 AND entity_id = $2
            ORDER BY seq
            "#,
        )
        .bind(entity)
        .bind(entity_id)
        .fetch_all(executor)
        .await
    }
}
