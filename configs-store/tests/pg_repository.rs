//! Repository tests against a live PostgreSQL instance.
//!
//! Run with `cargo test -p configs-store --features db-tests` and the
//! `CONFIGS_DB_*` environment pointing at a database that has had
//! `sql/configs.sql` applied.
#![cfg(feature = "db-tests")]

use configs_store::{ConfigPersistence, DbConfig, PgConfigRepository};

#[tokio::test]
async fn test_upsert_fetch_round_trip() {
    let repository = PgConfigRepository::from_config(&DbConfig::from_env()).unwrap();
    let key = "db-test.round-trip";

    repository.upsert(key, &[0xc3, 0x01, 0, 0, 0, 0, 0, 0, 0, 1], 1).await.unwrap();
    let first = repository.fetch(key).await.unwrap().unwrap();
    assert_eq!(first.updated_by, 1);

    // Upsert replaces in place and refreshes the audit columns.
    repository.upsert(key, &[0xc3, 0x01, 0, 0, 0, 0, 0, 0, 0, 2], 2).await.unwrap();
    let second = repository.fetch(key).await.unwrap().unwrap();
    assert_eq!(second.updated_by, 2);
    assert_eq!(second.bytes[9], 2);
    assert!(second.updated_on >= first.updated_on);
}

#[tokio::test]
async fn test_fetch_missing_key() {
    let repository = PgConfigRepository::from_config(&DbConfig::from_env()).unwrap();
    assert!(repository.fetch("db-test.missing").await.unwrap().is_none());
}
