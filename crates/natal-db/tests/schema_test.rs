//! Integration tests for schema initialization using in-memory SurrealDB.

use natal_core::repository::{Pagination, RoleRepository};
use natal_db::repository::SurrealRoleRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    natal_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "role",
        "user",
        "audit_log",
        "mother",
        "birth",
        "newborn",
        "correction",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    natal_db::run_migrations(&db).await.unwrap();
    natal_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), natal_db::latest_version() as usize);
}

#[tokio::test]
async fn default_roles_are_seeded_once() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    natal_db::run_migrations(&db).await.unwrap();

    let first = natal_db::seed_default_roles(&db).await.unwrap();
    let second = natal_db::seed_default_roles(&db).await.unwrap();
    assert_eq!(first, natal_db::default_roles().len());
    assert_eq!(second, 0);

    let repo = SurrealRoleRepository::new(db);
    let roles = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(roles.total, first as u64);

    let matrona = repo.get_by_name("Matrona Clínica").await.unwrap();
    assert!(!matrona.has(natal_core::capability::Capability::ViewAllBirths));
}
