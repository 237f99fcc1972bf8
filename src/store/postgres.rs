use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::{CheckStore, EmployeeDirectory, ManifestSource, StoreResult};
use crate::models::check_line::CheckLine;
use crate::models::history::{HistoryEntry, StockAtScan};
use crate::models::manifest::ExpectedLine;
use crate::models::snapshot::ScopeSnapshot;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckStore for PgStore {
    async fn get_current_state(&self, scope: &str) -> StoreResult<Option<ScopeSnapshot>> {
        let row = sqlx::query(
            r#"SELECT scope, lines, reset_at, updated_at
               FROM check_snapshots
               WHERE scope = $1"#,
        )
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Json(lines): Json<Vec<CheckLine>> = row.try_get("lines")?;
        Ok(Some(ScopeSnapshot {
            scope: row.try_get("scope")?,
            lines,
            reset_at: row.try_get("reset_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn put_current_state(&self, scope: &str, snapshot: &ScopeSnapshot) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO check_snapshots (scope, lines, reset_at, updated_at)
               VALUES ($1, $2, $3, COALESCE($4, NOW()))
               ON CONFLICT (scope) DO UPDATE
               SET lines = EXCLUDED.lines,
                   reset_at = EXCLUDED.reset_at,
                   updated_at = EXCLUDED.updated_at"#,
        )
        .bind(scope)
        .bind(Json(&snapshot.lines))
        .bind(snapshot.reset_at)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_history(&self, line_key: &str, entry: &HistoryEntry) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO check_history
               (line_key, operator_id, delta_quantity, delta_cartons, scanned_at, context)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(line_key)
        .bind(&entry.operator_id)
        .bind(entry.delta_quantity)
        .bind(entry.delta_cartons)
        .bind(entry.timestamp)
        .bind(entry.snapshot.clone().map(Json))
        .execute(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM check_history WHERE line_key = $1"#)
            .bind(line_key)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(count.max(0) as usize)
    }

    async fn get_history(&self, line_key: &str) -> StoreResult<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"SELECT operator_id, delta_quantity, delta_cartons, scanned_at, context
               FROM check_history
               WHERE line_key = $1
               ORDER BY scanned_at DESC, id DESC"#,
        )
        .bind(line_key)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<HistoryEntry> {
                let context: Option<Json<StockAtScan>> = row.try_get("context")?;
                Ok(HistoryEntry {
                    operator_id: row.try_get("operator_id")?,
                    delta_quantity: row.try_get("delta_quantity")?,
                    delta_cartons: row.try_get("delta_cartons")?,
                    timestamp: row.try_get("scanned_at")?,
                    snapshot: context.map(|Json(c)| c),
                })
            })
            .collect()
    }

    async fn prune_history(&self, line_key: &str, older_than: DateTime<Utc>) -> StoreResult<usize> {
        let result = sqlx::query(r#"DELETE FROM check_history WHERE line_key = $1 AND scanned_at < $2"#)
            .bind(line_key)
            .bind(older_than)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl ManifestSource for PgStore {
    async fn expected_lines(&self, shipment_code: &str) -> StoreResult<Vec<ExpectedLine>> {
        let lines = sqlx::query_as::<_, ExpectedLine>(
            r#"SELECT shipment_code, material_code, po_or_pallet_key,
                      expected_quantity, expected_cartons
               FROM shipment_manifest
               WHERE shipment_code = $1
               ORDER BY material_code, po_or_pallet_key"#,
        )
        .bind(shipment_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn replace_manifest(&self, shipment_code: &str, lines: &[ExpectedLine]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(r#"DELETE FROM shipment_manifest WHERE shipment_code = $1"#)
            .bind(shipment_code)
            .execute(&mut *tx)
            .await?;

        for line in lines {
            sqlx::query(
                r#"INSERT INTO shipment_manifest
                   (shipment_code, material_code, po_or_pallet_key, expected_quantity, expected_cartons)
                   VALUES ($1, $2, $3, $4, $5)
                   ON CONFLICT (shipment_code, material_code, po_or_pallet_key) DO UPDATE
                   SET expected_quantity = EXCLUDED.expected_quantity,
                       expected_cartons = EXCLUDED.expected_cartons"#,
            )
            .bind(shipment_code)
            .bind(&line.material_code)
            .bind(&line.po_or_pallet_key)
            .bind(line.expected_quantity)
            .bind(line.expected_cartons)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl EmployeeDirectory for PgStore {
    async fn display_name(&self, code: &str) -> StoreResult<Option<String>> {
        let name: Option<String> = sqlx::query_scalar(r#"SELECT display_name FROM employees WHERE code = $1"#)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn upsert(&self, code: &str, display_name: &str) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO employees (code, display_name) VALUES ($1, $2)
               ON CONFLICT (code) DO UPDATE SET display_name = EXCLUDED.display_name"#,
        )
        .bind(code)
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
