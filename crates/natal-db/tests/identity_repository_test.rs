//! Integration tests for the Role and User repositories.

use natal_core::capability::{Capability, CapabilitySet};
use natal_core::error::NatalError;
use natal_core::models::role::{CreateRole, UpdateRole};
use natal_core::models::user::{CreateUser, UpdateUser};
use natal_core::repository::{Pagination, RoleRepository, UserRepository};
use natal_db::repository::{SurrealRoleRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    natal_db::run_migrations(&db).await.unwrap();
    db
}

fn caps(list: &[Capability]) -> CapabilitySet {
    list.iter().copied().collect()
}

/// PHC-formatted placeholder; hashing itself is the auth layer's job.
const STORED_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHRzYWx0$aGFzaGhhc2hoYXNoaGFzaGhhc2hoYXNoaGFzaGhhc2g";

fn new_user(username: &str, role_id: Option<Uuid>) -> CreateUser {
    CreateUser {
        username: username.into(),
        email: format!("{username}@hospital.cl"),
        full_name: "Usuario de Prueba".into(),
        password_hash: STORED_HASH.into(),
        role_id,
        is_superuser: false,
    }
}

#[tokio::test]
async fn create_and_get_role_round_trips_capabilities() {
    let repo = SurrealRoleRepository::new(setup().await);
    let wanted = caps(&[
        Capability::CreateBirth,
        Capability::EditPartogram,
        Capability::ViewClinicalDashboard,
    ]);

    let role = repo
        .create(CreateRole {
            name: "Matrona Turno Noche".into(),
            description: "night shift".into(),
            capabilities: wanted.clone(),
        })
        .await
        .unwrap();
    assert_eq!(role.capabilities, wanted);

    let fetched = repo.get_by_id(role.id).await.unwrap();
    assert_eq!(fetched.name, "Matrona Turno Noche");
    assert_eq!(fetched.capabilities, wanted);

    let by_name = repo.get_by_name("Matrona Turno Noche").await.unwrap();
    assert_eq!(by_name.id, role.id);
}

#[tokio::test]
async fn segregation_violation_is_rejected_before_persistence() {
    let repo = SurrealRoleRepository::new(setup().await);

    let err = repo
        .create(CreateRole {
            name: "Admin Sistema".into(),
            description: String::new(),
            capabilities: caps(&[Capability::ManageUsers, Capability::ViewClinicalDashboard]),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, NatalError::SegregationViolation { .. }));

    let listed = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(listed.total, 0);
}

#[tokio::test]
async fn update_is_validated_against_the_merged_role() {
    let repo = SurrealRoleRepository::new(setup().await);
    let role = repo
        .create(CreateRole {
            name: "Auditor".into(),
            description: String::new(),
            capabilities: caps(&[Capability::ViewAudit]),
        })
        .await
        .unwrap();

    // Only the capability set changes, but the kept ViewAudit is what
    // makes the dashboard illegal.
    let err = repo
        .update(
            role.id,
            UpdateRole {
                capabilities: Some(caps(&[
                    Capability::ViewAudit,
                    Capability::ViewAdministrativeDashboard,
                ])),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NatalError::SegregationViolation { .. }));

    let renamed = repo
        .update(
            role.id,
            UpdateRole {
                name: Some("Auditoría".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Auditoría");
    assert!(renamed.has(Capability::ViewAudit));
}

#[tokio::test]
async fn role_in_use_cannot_be_deleted() {
    let db = setup().await;
    let roles = SurrealRoleRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);

    let role = roles
        .create(CreateRole {
            name: "Médico".into(),
            description: String::new(),
            capabilities: caps(&[Capability::ViewAllBirths]),
        })
        .await
        .unwrap();
    let user = users.create(new_user("medico1", Some(role.id))).await.unwrap();
    assert_eq!(users.count_by_role(role.id).await.unwrap(), 1);

    let err = roles.delete(role.id).await.unwrap_err();
    assert!(matches!(err, NatalError::Referential { .. }));

    users
        .update(
            user.id,
            UpdateUser {
                role_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    roles.delete(role.id).await.unwrap();
    assert!(matches!(
        roles.get_by_id(role.id).await,
        Err(NatalError::NotFound { .. })
    ));
}

#[tokio::test]
async fn create_and_get_user() {
    let repo = SurrealUserRepository::new(setup().await);
    let user = repo.create(new_user("matrona1", None)).await.unwrap();

    assert_eq!(user.password_hash, STORED_HASH);
    assert!(user.active);
    assert!(!user.is_superuser);

    let by_name = repo.get_by_username("matrona1").await.unwrap();
    assert_eq!(by_name.id, user.id);
}

#[tokio::test]
async fn plaintext_password_is_refused() {
    let repo = SurrealUserRepository::new(setup().await);
    let mut input = new_user("matrona1", None);
    input.password_hash = "Hospital2025".into();

    let err = repo.create(input).await.unwrap_err();
    assert!(matches!(err, NatalError::Validation { .. }));
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let repo = SurrealUserRepository::new(setup().await);
    repo.create(new_user("matrona1", None)).await.unwrap();

    let err = repo.create(new_user("matrona1", None)).await.unwrap_err();
    assert!(matches!(err, NatalError::AlreadyExists { .. }));
}

#[tokio::test]
async fn deactivation_and_listing() {
    let repo = SurrealUserRepository::new(setup().await);
    let a = repo.create(new_user("a", None)).await.unwrap();
    repo.create(new_user("b", None)).await.unwrap();

    let updated = repo
        .update(
            a.id,
            UpdateUser {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.active);

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 1,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn update_of_missing_user_is_not_found() {
    let repo = SurrealUserRepository::new(setup().await);
    let err = repo
        .update(
            Uuid::new_v4(),
            UpdateUser {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NatalError::NotFound { .. }));
}
