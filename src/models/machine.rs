use crate::constants::MachineStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::FromRow;
use uuid::Uuid;

/// A vending machine in the fleet.
///
/// Owned by the fleet-management side of the system; the core only reads it to
/// decide which machines receive recurring work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub status: MachineStatus,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMachine {
    pub code: String,
    pub name: String,
    pub status: MachineStatus,
    pub location: Option<String>,
}

impl Machine {
    /// Register a machine. Used by fixtures and the admin side.
    pub async fn create<'e, E>(
        executor: E,
        new_machine: NewMachine,
        now: DateTime<Utc>,
    ) -> Result<Machine, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Machine>(
            r#"
            INSERT INTO machines (id, code, name, status, location, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, code, name, status, location, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_machine.code)
        .bind(new_machine.name)
        .bind(new_machine.status.as_str())
        .bind(new_machine.location)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Machine>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Machine>(
            r#"
            SELECT id, code, name, status, location, created_at, updated_at
            FROM machines
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Active machines in a stable order, so scheduler runs visit them identically.
    pub async fn list_active<'e, E>(executor: E) -> Result<Vec<Machine>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Machine>(
            r#"
            SELECT id, code, name, status, location, created_at, updated_at
            FROM machines
            WHERE status = $1
            ORDER BY code
            "#,
        )
        .bind(MachineStatus::Active.as_str())
        .fetch_all(executor)
        .await
    }

    pub fn is_active(&self) -> bool {
        self.status == MachineStatus::Active
    }
}
