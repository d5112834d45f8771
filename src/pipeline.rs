//! Load orchestration
//!
//! ```text
//!   relationships CSV ──────────────────────────────┐
//!                                                   ▼
//!   source.geo_type ──► location_type ──► catalog ──┬──► location_type_parent_location_types
//!                                                   │
//!   source rows (as-of, simplified) ────────────────┴──► location
//! ```
//!
//! The relationship CSV is read before anything touches the target. All
//! writes, including the initial clear, go through one sink transaction.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::catalog::{LocationType, LocationTypeCatalog};
use crate::config::LoaderConfig;
use crate::error::Result;
use crate::locations::{join_locations, JoinedLocations, LocationRecord, SourceLocation, SourceQuery};
use crate::relationships::{
    read_relationship_config, resolve_relationships, LocationTypeRelationship, RelationshipRow,
    ResolvedRelationships,
};
use crate::report::LoadReport;

/// Read side: the source geography table
#[async_trait]
pub trait GeoSource: Send + Sync {
    /// Distinct type names, ordered by the source database
    async fn location_type_names(&self, query: &SourceQuery) -> Result<Vec<String>>;

    async fn locations(&self, query: &SourceQuery) -> Result<Vec<SourceLocation>>;
}

/// Write side: the three destination tables
#[async_trait]
pub trait LocationSink: Send {
    async fn begin(&mut self) -> Result<()>;

    /// Delete all rows from the destination tables
    async fn clear(&mut self) -> Result<()>;

    async fn insert_location_types(&mut self, types: &[LocationType]) -> Result<u64>;

    async fn insert_locations(&mut self, batch: &[LocationRecord]) -> Result<u64>;

    async fn insert_relationships(&mut self, rows: &[LocationTypeRelationship]) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    /// Discard everything since `begin()`; a no-op without an open transaction
    async fn rollback(&mut self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub query: SourceQuery,
    pub relationships_csv: PathBuf,
    pub batch_size: usize,
    /// Read and transform only; the target is left untouched
    pub dry_run: bool,
}

impl LoadOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            query: SourceQuery::from_settings(&config.load)?,
            relationships_csv: config.relationships_path(),
            batch_size: config.load.batch_size,
            dry_run: false,
        })
    }
}

pub struct LocationLoader<S, K> {
    source: S,
    sink: K,
    options: LoadOptions,
}

impl<S, K> LocationLoader<S, K>
where
    S: GeoSource,
    K: LocationSink,
{
    pub fn new(source: S, sink: K, options: LoadOptions) -> Self {
        Self {
            source,
            sink,
            options,
        }
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }

    /// Clear the destination, then load types, locations and type parents.
    pub async fn run(&mut self) -> Result<LoadReport> {
        let started = Instant::now();
        let dry_run = self.options.dry_run;

        let relationship_rows = read_relationship_config(&self.options.relationships_csv)?;
        debug!(
            "Read {} relationship rows from {}",
            relationship_rows.len(),
            self.options.relationships_csv.display()
        );

        if dry_run {
            info!("Dry run: target tables will not be modified");
        } else {
            self.sink.begin().await?;
        }

        let loaded = self.load_all(&relationship_rows).await;
        let (catalog, joined, resolved) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                if !dry_run {
                    if let Err(rollback_err) = self.sink.rollback().await {
                        warn!("Rollback after failed load also failed: {}", rollback_err);
                    }
                }
                return Err(e);
            }
        };

        let report = LoadReport {
            dry_run,
            as_of: self.options.query.as_of,
            location_types: catalog.len(),
            locations: joined.records.len(),
            locations_dropped: joined.dropped,
            relationships: resolved.relationships.len(),
            unresolved_relationships: resolved.unresolved,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            "Load complete: {} location types, {} locations, {} relationships",
            report.location_types, report.locations, report.relationships
        );
        Ok(report)
    }

    /// Clear (unless dry run), load all three tables and commit
    async fn load_all(
        &mut self,
        relationship_rows: &[RelationshipRow],
    ) -> Result<(LocationTypeCatalog, JoinedLocations, ResolvedRelationships)> {
        if !self.options.dry_run {
            info!("Clearing target tables");
            self.sink.clear().await?;
        }

        let catalog = self.load_location_types().await?;
        let joined = self.load_locations(&catalog).await?;
        let resolved = self
            .load_location_parents(&catalog, relationship_rows)
            .await?;

        if !self.options.dry_run {
            self.sink.commit().await?;
        }
        Ok((catalog, joined, resolved))
    }

    async fn load_location_types(&mut self) -> Result<LocationTypeCatalog> {
        info!("Loading location types");

        let names = self
            .source
            .location_type_names(&self.options.query)
            .await?;
        let catalog = LocationTypeCatalog::from_ordered_names(names)?;

        if !self.options.dry_run {
            let inserted = self.sink.insert_location_types(catalog.types()).await?;
            check_count("location_type", catalog.len(), inserted);
        }

        info!("  {} location types", catalog.len());
        Ok(catalog)
    }

    async fn load_locations(&mut self, catalog: &LocationTypeCatalog) -> Result<JoinedLocations> {
        info!(
            "Loading locations valid on {} (tolerance {}, SRID {})",
            self.options.query.as_of, self.options.query.tolerance, self.options.query.target_srid
        );

        let rows = self.source.locations(&self.options.query).await?;
        let fetched = rows.len();
        let joined = join_locations(rows, catalog);

        for (geo_type, count) in &joined.dropped {
            warn!(
                "Dropping {} location(s) with unknown geo_type '{}'",
                count, geo_type
            );
        }

        if !self.options.dry_run {
            let batch_size = self.options.batch_size.max(1);
            let total_batches = joined.records.len().div_ceil(batch_size);
            let mut total_inserted = 0u64;

            for (batch_idx, chunk) in joined.records.chunks(batch_size).enumerate() {
                total_inserted += self.sink.insert_locations(chunk).await?;
                debug!(
                    "Batch {}/{}: {} locations inserted",
                    batch_idx + 1,
                    total_batches,
                    total_inserted
                );
            }
            check_count("location", joined.records.len(), total_inserted);
        }

        info!(
            "  {} of {} source locations",
            joined.records.len(),
            fetched
        );
        Ok(joined)
    }

    async fn load_location_parents(
        &mut self,
        catalog: &LocationTypeCatalog,
        rows: &[RelationshipRow],
    ) -> Result<ResolvedRelationships> {
        info!("Loading location parents");

        let resolved = resolve_relationships(rows, catalog);

        if !self.options.dry_run {
            let inserted = self
                .sink
                .insert_relationships(&resolved.relationships)
                .await?;
            check_count(
                "location_type_parent_location_types",
                resolved.relationships.len(),
                inserted,
            );
        }

        info!("  {} relationships", resolved.relationships.len());
        Ok(resolved)
    }
}

fn check_count(table: &str, expected: usize, affected: u64) {
    if affected != expected as u64 {
        warn!(
            "{}: expected {} rows written, database reported {}",
            table, expected, affected
        );
    }
}
