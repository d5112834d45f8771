//! PostgreSQL implementation of the source geography reader.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::locations::{SourceLocation, SourceQuery};
use crate::pipeline::GeoSource;

#[derive(Clone)]
pub struct PgGeoSource {
    pool: PgPool,
}

impl PgGeoSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GeoSource for PgGeoSource {
    async fn location_type_names(&self, query: &SourceQuery) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(&query.location_types_sql())
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn locations(&self, query: &SourceQuery) -> Result<Vec<SourceLocation>> {
        let rows = sqlx::query_as::<_, SourceLocation>(&query.locations_sql())
            .bind(query.tolerance)
            .bind(query.target_srid)
            .bind(query.as_of)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
