//! Summary of a load run

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::relationships::UnresolvedRelationship;

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub dry_run: bool,
    pub as_of: NaiveDate,
    pub location_types: usize,
    pub locations: usize,
    /// Source rows whose geo_type had no location type, per geo_type
    pub locations_dropped: BTreeMap<String, usize>,
    pub relationships: usize,
    pub unresolved_relationships: Vec<UnresolvedRelationship>,
    pub elapsed_ms: u128,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "Would load" } else { "Loaded" };
        writeln!(f, "{} locations valid on {}:", verb, self.as_of)?;
        writeln!(f, "  location_type:                       {}", self.location_types)?;
        writeln!(f, "  location:                            {}", self.locations)?;
        writeln!(f, "  location_type_parent_location_types: {}", self.relationships)?;

        for (geo_type, count) in &self.locations_dropped {
            writeln!(f, "  dropped {} location(s) of unknown type '{}'", count, geo_type)?;
        }
        for skipped in &self.unresolved_relationships {
            writeln!(
                f,
                "  skipped relationship row {}: {} -> {}",
                skipped.row, skipped.child_type, skipped.parent_type
            )?;
        }
        write!(f, "Finished in {} ms", self.elapsed_ms)
    }
}
