//! Location rows: source selection and the join onto location types

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::catalog::LocationTypeCatalog;
use crate::config::{validate_identifier, LoadSettings};
use crate::error::Result;

/// A boundary as read from the source table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct SourceLocation {
    pub geoid: String,
    pub geo_type: String,
    pub name: Option<String>,
    /// Simplified, reprojected geometry as EWKB
    pub geometry: Option<Vec<u8>>,
}

/// A row of the `location` table
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub id: String,
    pub name: Option<String>,
    pub geometry: Option<Vec<u8>>,
    pub color: Option<String>,
    pub location_type_id: i64,
}

/// Parameters of the source read
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    pub table: String,
    pub as_of: NaiveDate,
    pub tolerance: f64,
    pub target_srid: i32,
}

impl SourceQuery {
    pub fn from_settings(load: &LoadSettings) -> Result<Self> {
        validate_identifier(&load.source_table)?;
        Ok(Self {
            table: load.source_table.clone(),
            as_of: load.as_of,
            tolerance: load.simplify_tolerance,
            target_srid: load.target_srid,
        })
    }

    /// Distinct type names in the database's collation order.
    /// Binds nothing.
    pub fn location_types_sql(&self) -> String {
        format!(
            r#"
            SELECT DISTINCT geo_type
            FROM {}
            WHERE geo_type IS NOT NULL
            ORDER BY geo_type
            "#,
            self.table
        )
    }

    /// Areas valid on the as-of date.
    /// Binds `$1` tolerance, `$2` target SRID, `$3` as-of date.
    ///
    /// Simplification keeps the geometry's own SRID; the result is then
    /// reprojected to the target SRID. Geometries without an SRID are tagged
    /// with the target SRID as-is.
    pub fn locations_sql(&self) -> String {
        format!(
            r#"
            SELECT
                geoid::text AS geoid,
                geo_type,
                name,
                ST_AsEWKB(
                    CASE WHEN ST_SRID(geometry) = 0
                        THEN ST_SetSRID(ST_Simplify(geometry, $1), $2)
                        ELSE ST_Transform(
                            ST_SetSRID(ST_Simplify(geometry, $1), ST_SRID(geometry)),
                            $2
                        )
                    END
                ) AS geometry
            FROM {}
            WHERE start_date <= $3
              AND end_date >= $3
              AND geo_type IS NOT NULL
            ORDER BY geoid
            "#,
            self.table
        )
    }
}

/// Outcome of joining source rows onto the catalog
#[derive(Debug, Default)]
pub struct JoinedLocations {
    pub records: Vec<LocationRecord>,
    /// Rows dropped per unknown geo_type
    pub dropped: BTreeMap<String, usize>,
}

impl JoinedLocations {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Inner join on `geo_type`; source order is kept.
pub fn join_locations(rows: Vec<SourceLocation>, catalog: &LocationTypeCatalog) -> JoinedLocations {
    let mut joined = JoinedLocations {
        records: Vec::with_capacity(rows.len()),
        dropped: BTreeMap::new(),
    };

    for row in rows {
        match catalog.id_of(&row.geo_type) {
            Some(location_type_id) => joined.records.push(LocationRecord {
                id: row.geoid,
                name: row.name,
                geometry: row.geometry,
                color: None,
                location_type_id,
            }),
            None => *joined.dropped.entry(row.geo_type).or_insert(0) += 1,
        }
    }

    joined
}
