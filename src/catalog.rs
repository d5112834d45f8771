//! Location type lookup
//!
//! Every distinct `geo_type` in the source becomes one `location_type` row.
//! Ids and sort order both follow the source database's ordering of the
//! names, so the same source always produces the same ids.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{LoaderError, Result};

/// A row of the `location_type` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationType {
    pub id: i64,
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct LocationTypeCatalog {
    types: Vec<LocationType>,
    by_name: HashMap<String, i64>,
}

impl LocationTypeCatalog {
    /// Build the catalog from names already sorted by the source database.
    pub fn from_ordered_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::default();
        for name in names {
            let name = name.into();
            if catalog.by_name.contains_key(&name) {
                return Err(LoaderError::DuplicateLocationType(name));
            }
            let id = catalog.types.len() as i64 + 1;
            catalog.by_name.insert(name.clone(), id);
            catalog.types.push(LocationType {
                id,
                name,
                sort_order: id,
            });
        }
        Ok(catalog)
    }

    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    /// Rows in id order
    pub fn types(&self) -> &[LocationType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
