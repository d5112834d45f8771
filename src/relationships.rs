//! Type hierarchy: which location types are contained in which
//!
//! The hierarchy is configured in a CSV with `child_type,parent_type`
//! columns and resolved against the catalog into
//! `location_type_parent_location_types` rows.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::LocationTypeCatalog;
use crate::error::{LoaderError, Result};

const CHILD_COLUMN: &str = "child_type";
const PARENT_COLUMN: &str = "parent_type";

/// One configured edge, by type name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipRow {
    pub child_type: String,
    pub parent_type: String,
}

/// A row of `location_type_parent_location_types`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationTypeRelationship {
    pub id: i64,
    pub from_locationtype_id: i64,
    pub to_locationtype_id: i64,
}

/// A configured edge naming a type the source does not have
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRelationship {
    /// 1-based data row in the CSV
    pub row: usize,
    pub child_type: String,
    pub parent_type: String,
}

#[derive(Debug, Default)]
pub struct ResolvedRelationships {
    pub relationships: Vec<LocationTypeRelationship>,
    pub unresolved: Vec<UnresolvedRelationship>,
}

pub fn read_relationship_config(path: &Path) -> Result<Vec<RelationshipRow>> {
    let file = std::fs::File::open(path).map_err(|e| LoaderError::io(path, e))?;
    parse_relationship_config(file)
}

pub fn parse_relationship_config<R: Read>(reader: R) -> Result<Vec<RelationshipRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    for column in [CHILD_COLUMN, PARENT_COLUMN] {
        if !headers.iter().any(|h| h == column) {
            return Err(LoaderError::MissingColumn(column));
        }
    }

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: RelationshipRow = result?;
        rows.push(row);
    }
    Ok(rows)
}

/// Join each row against the catalog for both ends. CSV order is kept and
/// ids are assigned 0.. over the rows that resolve.
pub fn resolve_relationships(
    rows: &[RelationshipRow],
    catalog: &LocationTypeCatalog,
) -> ResolvedRelationships {
    let mut resolved = ResolvedRelationships::default();

    for (idx, row) in rows.iter().enumerate() {
        let child = catalog.id_of(&row.child_type);
        let parent = catalog.id_of(&row.parent_type);

        match (child, parent) {
            (Some(from_locationtype_id), Some(to_locationtype_id)) => {
                let id = resolved.relationships.len() as i64;
                resolved.relationships.push(LocationTypeRelationship {
                    id,
                    from_locationtype_id,
                    to_locationtype_id,
                });
            }
            _ => {
                warn!(
                    "Skipping relationship row {}: {} -> {} (unknown location type)",
                    idx + 1,
                    row.child_type,
                    row.parent_type
                );
                resolved.unresolved.push(UnresolvedRelationship {
                    row: idx + 1,
                    child_type: row.child_type.clone(),
                    parent_type: row.parent_type.clone(),
                });
            }
        }
    }

    resolved
}
