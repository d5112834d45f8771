//! PostgreSQL implementation of the destination writer.
//!
//! Everything from `begin()` to `commit()` runs in one transaction; a failed
//! load is rolled back and the sink can be reused for the next `begin()`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::catalog::LocationType;
use crate::error::{LoaderError, Result};
use crate::locations::LocationRecord;
use crate::pipeline::LocationSink;
use crate::relationships::LocationTypeRelationship;

/// Child tables first so foreign keys never block the delete
const CLEAR_STATEMENTS: [&str; 3] = [
    "DELETE FROM location",
    "DELETE FROM location_type_parent_location_types",
    "DELETE FROM location_type",
];

pub struct PgLocationSink {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLocationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| LoaderError::Sink("no open transaction; call begin() first".into()))
    }
}

#[async_trait]
impl LocationSink for PgLocationSink {
    async fn begin(&mut self) -> Result<()> {
        if let Some(stale) = self.tx.take() {
            warn!("Rolling back transaction left open by an earlier load");
            stale.rollback().await?;
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        let tx = self.tx()?;
        for stmt in CLEAR_STATEMENTS {
            let result = sqlx::query(stmt).execute(&mut **tx).await?;
            debug!("{}: {} rows", stmt, result.rows_affected());
        }
        Ok(())
    }

    async fn insert_location_types(&mut self, types: &[LocationType]) -> Result<u64> {
        if types.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = types.iter().map(|t| t.id).collect();
        let names: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
        let sort_orders: Vec<i64> = types.iter().map(|t| t.sort_order).collect();

        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            INSERT INTO location_type (id, name, sort_order)
            SELECT u.id, u.name, u.sort_order
            FROM UNNEST($1::bigint[], $2::text[], $3::bigint[])
                AS u(id, name, sort_order)
            "#,
        )
        .bind(&ids)
        .bind(&names)
        .bind(&sort_orders)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_locations(&mut self, batch: &[LocationRecord]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        // Collect arrays for UNNEST
        let ids: Vec<&str> = batch.iter().map(|r| r.id.as_str()).collect();
        let names: Vec<Option<&str>> = batch.iter().map(|r| r.name.as_deref()).collect();
        let geometries: Vec<Option<&[u8]>> = batch.iter().map(|r| r.geometry.as_deref()).collect();
        let colors: Vec<Option<&str>> = batch.iter().map(|r| r.color.as_deref()).collect();
        let type_ids: Vec<i64> = batch.iter().map(|r| r.location_type_id).collect();

        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            INSERT INTO location (id, name, geometry, color, location_type_id)
            SELECT u.id, u.name, ST_GeomFromEWKB(u.geometry), u.color, u.location_type_id
            FROM UNNEST($1::text[], $2::text[], $3::bytea[], $4::text[], $5::bigint[])
                AS u(id, name, geometry, color, location_type_id)
            "#,
        )
        .bind(&ids)
        .bind(&names)
        .bind(&geometries)
        .bind(&colors)
        .bind(&type_ids)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_relationships(&mut self, rows: &[LocationTypeRelationship]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let from_ids: Vec<i64> = rows.iter().map(|r| r.from_locationtype_id).collect();
        let to_ids: Vec<i64> = rows.iter().map(|r| r.to_locationtype_id).collect();

        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            INSERT INTO location_type_parent_location_types
                (id, from_locationtype_id, to_locationtype_id)
            SELECT u.id, u.from_id, u.to_id
            FROM UNNEST($1::bigint[], $2::bigint[], $3::bigint[])
                AS u(id, from_id, to_id)
            "#,
        )
        .bind(&ids)
        .bind(&from_ids)
        .bind(&to_ids)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| LoaderError::Sink("no open transaction to commit".into()))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!("Target transaction rolled back");
        }
        Ok(())
    }
}
