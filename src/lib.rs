//! location-loader
//!
//! Loads administrative and statistical area boundaries from a PostGIS
//! source table into the normalized `location` / `location_type` /
//! `location_type_parent_location_types` schema.
//!
//! The pipeline itself ([`pipeline::LocationLoader`]) only talks to the
//! [`pipeline::GeoSource`] and [`pipeline::LocationSink`] traits; the Postgres
//! implementations live in [`database`] behind the `database` feature.

pub mod catalog;
pub mod config;
pub mod error;
pub mod locations;
pub mod pipeline;
pub mod relationships;
pub mod report;

#[cfg(feature = "database")]
pub mod database;

pub use catalog::{LocationType, LocationTypeCatalog};
pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use locations::{LocationRecord, SourceLocation, SourceQuery};
pub use pipeline::{GeoSource, LoadOptions, LocationLoader, LocationSink};
pub use relationships::{LocationTypeRelationship, RelationshipRow};
pub use report::LoadReport;
