use crate::constants::MovementType;
use crate::models::pagination::PageRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// Immutable ledger entry for one inventory quantity change.
///
/// For `in`/`out` rows `quantity` is the positive amount moved; for `adjustment`
/// rows it is the signed delta. In every case
/// `quantity_after == quantity_before + signed(quantity)`, enforced by a CHECK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub item_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reason: String,
    pub machine_id: Option<Uuid>,
    pub reference: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementFilter {
    pub item_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
}

/// Per-item totals of one machine's movements over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MachineItemTotals {
    pub item_id: Uuid,
    pub movement_count: i64,
    pub units_in: i64,
    pub units_out: i64,
}

const MOVEMENT_COLUMNS: &str = "id, item_id, movement_type, quantity, quantity_before, \
    quantity_after, reason, machine_id, reference, user_id, created_at";

impl StockMovement {
    pub async fn insert<'e, E>(executor: E, movement: &StockMovement) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, item_id, movement_type, quantity, quantity_before,
                quantity_after, reason, machine_id, reference, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(movement.id)
        .bind(movement.item_id)
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.quantity_before)
        .bind(movement.quantity_after)
        .bind(&movement.reason)
        .bind(movement.machine_id)
        .bind(&movement.reference)
        .bind(movement.user_id)
        .bind(movement.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Filtered page of movements, newest first, plus the total matching count.
    pub async fn list(
        conn: &mut PgConnection,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> Result<(Vec<StockMovement>, i64), sqlx::Error> {
        let movement_type = filter.movement_type.map(|t| t.as_str());

        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE ($1::uuid IS NULL OR item_id = $1) \
               AND ($2::uuid IS NULL OR user_id = $2) \
               AND ($3::text IS NULL OR movement_type = $3) \
             ORDER BY seq DESC \
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.item_id)
        .bind(filter.user_id)
        .bind(movement_type)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM stock_movements
            WHERE ($1::uuid IS NULL OR item_id = $1)
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::text IS NULL OR movement_type = $3)
            "#,
        )
        .bind(filter.item_id)
        .bind(filter.user_id)
        .bind(movement_type)
        .fetch_one(&mut *conn)
        .await?;

        Ok((movements, total))
    }

    /// All movements of one item in commit order.
    pub async fn list_for_item<'e, E>(executor: E, item_id: Uuid) -> Result<Vec<StockMovement>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE item_id = $1 \
             ORDER BY seq"
        ))
        .bind(item_id)
        .fetch_all(executor)
        .await
    }

    /// Per-item totals of a machine's movements in `[from, to)`.
    pub async fn machine_totals<'e, E>(
        executor: E,
        machine_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MachineItemTotals>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MachineItemTotals>(
            r#"
            SELECT item_id,
                   COUNT(*)::bigint AS movement_count,
                   COALESCE(SUM(quantity) FILTER (WHERE movement_type = 'in'), 0)::bigint AS units_in,
                   COALESCE(SUM(quantity) FILTER (WHERE movement_type = 'out'), 0)::bigint AS units_out
            FROM stock_movements
            WHERE machine_id = $1 AND created_at >= $2 AND created_at < $3
            GROUP BY item_id
            ORDER BY item_id
            "#,
        )
        .bind(machine_id)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await
    }
}
