#![allow(dead_code)]

use api_lib::adapters::db::DbAdapter;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tempfile::TempDir;

/// A migrated SQLite database in a temporary directory.
/// The directory is removed when the returned `TempDir` is dropped.
pub async fn setup_test_db() -> (TempDir, DbAdapter) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("attendance.db").display());
    let adapter = DbAdapter::connect(&url, 5)
        .await
        .expect("Failed to open test database");
    adapter
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    (dir, adapter)
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

pub fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
}
