//! Postgres/PostGIS integration tests
//!
//! Needs two PostGIS databases (they may be the same one):
//!   SOURCE_DATABASE_URL: gets the `geographies` fixture tables
//!   TARGET_DATABASE_URL: gets the location tables
//!
//! Run with: cargo test --features database --test db_integration -- --ignored

#![cfg(feature = "database")]

use std::env;
use std::path::PathBuf;

use chrono::NaiveDate;
use location_loader::database::{PgGeoSource, PgLocationSink};
use location_loader::{LoadOptions, LocationLoader, SourceQuery};
use once_cell::sync::Lazy;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};

/// The tests share one pair of databases
static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

async fn setup_pool(var: &str) -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = env::var(var).unwrap_or_else(|_| panic!("{} must be set", var));
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database")
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(name)
}

async fn apply_sql(pool: &PgPool, file: &str) {
    let sql = std::fs::read_to_string(fixture(file)).expect("read sql fixture");
    sqlx::raw_sql(&sql)
        .execute(pool)
        .await
        .unwrap_or_else(|e| panic!("Failed to apply {}: {}", file, e));
}

async fn setup() -> (MutexGuard<'static, ()>, PgPool, PgPool) {
    let guard = DB_LOCK.lock().await;
    let source = setup_pool("SOURCE_DATABASE_URL").await;
    let target = setup_pool("TARGET_DATABASE_URL").await;
    apply_sql(&source, "sql/source_fixture.sql").await;
    apply_sql(&target, "sql/target_schema.sql").await;
    (guard, source, target)
}

fn options(as_of: NaiveDate) -> LoadOptions {
    LoadOptions {
        query: SourceQuery {
            table: "geographies".into(),
            as_of,
            tolerance: 0.001,
            target_srid: 4326,
        },
        relationships_csv: fixture("conf/location_type_relationships.csv"),
        batch_size: 2,
        dry_run: false,
    }
}

/// First exterior-ring vertex of a loaded location
async fn first_vertex(pool: &PgPool, id: &str) -> (i32, f64, f64) {
    sqlx::query_as(
        r#"SELECT ST_SRID(geometry),
                  ST_X(ST_PointN(ST_ExteriorRing(geometry), 1)),
                  ST_Y(ST_PointN(ST_ExteriorRing(geometry), 1))
           FROM location WHERE id = $1"#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .expect("vertex query")
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count query")
}

#[tokio::test]
#[ignore]
async fn test_load_into_postgis() {
    let (_guard, source, target) = setup().await;
    let as_of = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

    let mut loader = LocationLoader::new(
        PgGeoSource::new(source.clone()),
        PgLocationSink::new(target.clone()),
        options(as_of),
    );
    let report = loader.run().await.expect("load succeeds");

    // county, state, tract; the NULL geo_type row is ignored
    assert_eq!(report.location_types, 3);
    // San Francisco ended in 2020
    assert_eq!(report.locations, 3);
    // county->state, tract->county
    assert_eq!(report.relationships, 2);

    let types: Vec<(i64, String, i64)> =
        sqlx::query_as("SELECT id, name, sort_order FROM location_type ORDER BY id")
            .fetch_all(&target)
            .await
            .unwrap();
    assert_eq!(
        types,
        vec![
            (1, "county".to_string(), 1),
            (2, "state".to_string(), 2),
            (3, "tract".to_string(), 3),
        ]
    );

    let srids: Vec<i32> =
        sqlx::query_scalar("SELECT DISTINCT ST_SRID(geometry) FROM location")
            .fetch_all(&target)
            .await
            .unwrap();
    assert_eq!(srids, vec![4326]);

    let alameda: (String, i64, Option<String>) = sqlx::query_as(
        "SELECT name, location_type_id, color FROM location WHERE id = '06001'",
    )
    .fetch_one(&target)
    .await
    .unwrap();
    assert_eq!(alameda, ("Alameda County".to_string(), 1, None));

    let edges: Vec<(i64, i64, i64)> = sqlx::query_as(
        r#"SELECT id, from_locationtype_id, to_locationtype_id
           FROM location_type_parent_location_types ORDER BY id"#,
    )
    .fetch_all(&target)
    .await
    .unwrap();
    assert_eq!(edges, vec![(0, 1, 2), (1, 3, 1)]);
}

#[tokio::test]
#[ignore]
async fn test_reload_replaces_previous_contents() {
    let (_guard, source, target) = setup().await;

    for as_of in [
        NaiveDate::from_ymd_opt(2015, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
    ] {
        let mut loader = LocationLoader::new(
            PgGeoSource::new(source.clone()),
            PgLocationSink::new(target.clone()),
            options(as_of),
        );
        loader.run().await.expect("load succeeds");
    }

    assert_eq!(count(&target, "location_type").await, 3);
    assert_eq!(count(&target, "location").await, 3);
    assert_eq!(count(&target, "location_type_parent_location_types").await, 2);
}

#[tokio::test]
#[ignore]
async fn test_failed_load_rolls_back() {
    let (_guard, source, target) = setup().await;

    let mut loader = LocationLoader::new(
        PgGeoSource::new(source.clone()),
        PgLocationSink::new(target.clone()),
        options(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()),
    );
    loader.run().await.expect("initial load succeeds");

    let mut broken = options(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    broken.query.table = "no_such_geographies".into();
    let mut loader = LocationLoader::new(
        PgGeoSource::new(source.clone()),
        PgLocationSink::new(target.clone()),
        broken,
    );
    assert!(loader.run().await.is_err());
    let (_, sink) = loader.into_parts();
    assert!(!sink.in_transaction());

    assert_eq!(count(&target, "location").await, 3);
    assert_eq!(count(&target, "location_type").await, 3);

    // The same sink takes the next load
    let mut loader = LocationLoader::new(
        PgGeoSource::new(source.clone()),
        sink,
        options(NaiveDate::from_ymd_opt(2015, 6, 1).unwrap()),
    );
    loader.run().await.expect("load after failure succeeds");
    assert_eq!(count(&target, "location").await, 3);
}

#[tokio::test]
#[ignore]
async fn test_geometries_are_tagged_or_reprojected_to_target_srid() {
    let (_guard, source, target) = setup().await;

    let mut opts = options(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    opts.query.table = "geographies_nosrid".into();
    let mut loader = LocationLoader::new(
        PgGeoSource::new(source.clone()),
        PgLocationSink::new(target.clone()),
        opts,
    );
    let report = loader.run().await.expect("load succeeds");
    assert_eq!(report.locations, 2);

    // No SRID: tagged 4326, coordinates untouched
    let (srid, x, y) = first_vertex(&target, "N1").await;
    assert_eq!(srid, 4326);
    assert_eq!((x, y), (10.0, 10.0));

    // EPSG:3857 source: reprojected to lon/lat
    let (srid, x, y) = first_vertex(&target, "M1").await;
    assert_eq!(srid, 4326);
    let (expected_x, expected_y): (f64, f64) = sqlx::query_as(
        r#"SELECT ST_X(p), ST_Y(p) FROM (
               SELECT ST_Transform(ST_SetSRID(ST_MakePoint(-13600000, 4500000), 3857), 4326) AS p
           ) t"#,
    )
    .fetch_one(&target)
    .await
    .unwrap();
    assert!((x - expected_x).abs() < 1e-9, "x = {}, expected {}", x, expected_x);
    assert!((y - expected_y).abs() < 1e-9, "y = {}, expected {}", y, expected_y);
    assert!((-123.0..-121.0).contains(&x));
    assert!((37.0..38.0).contains(&y));
}
