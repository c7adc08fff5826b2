use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// Per-machine bin level for one item, tracked apart from the central pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MachineInventory {
    pub id: Uuid,
    pub machine_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i64,
    pub capacity: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

const BIN_COLUMNS: &str = "id, machine_id, item_id, quantity, capacity, updated_at";

impl MachineInventory {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<MachineInventory>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MachineInventory>(&format!(
            "SELECT {BIN_COLUMNS} FROM machine_inventory WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<MachineInventory>, sqlx::Error> {
        sqlx::query_as::<_, MachineInventory>(&format!(
            "SELECT {BIN_COLUMNS} FROM machine_inventory WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Lock the bin for `(machine, item)`, creating an empty one first if needed.
    pub async fn lock_or_create(
        conn: &mut PgConnection,
        machine_id: Uuid,
        item_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MachineInventory, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO machine_inventory (id, machine_id, item_id, quantity, capacity, updated_at)
            VALUES ($1, $2, $3, 0, NULL, $4)
            ON CONFLICT (machine_id, item_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(machine_id)
        .bind(item_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, MachineInventory>(&format!(
            "SELECT {BIN_COLUMNS} FROM machine_inventory \
             WHERE machine_id = $1 AND item_id = $2 \
             FOR UPDATE"
        ))
        .bind(machine_id)
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn set_quantity<'e, E>(
        executor: E,
        id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE machine_inventory SET quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn list_for_machine<'e, E>(
        executor: E,
        machine_id: Uuid,
    ) -> Result<Vec<MachineInventory>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MachineInventory>(&format!(
            "SELECT {BIN_COLUMNS} FROM machine_inventory WHERE machine_id = $1 ORDER BY item_id"
        ))
        .bind(machine_id)
        .fetch_all(executor)
        .await
    }
}
