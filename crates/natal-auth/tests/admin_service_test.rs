//! Integration tests for user and role administration.

use natal_auth::admin::{AdminService, NewUser};
use natal_auth::config::AuthConfig;
use natal_auth::password;
use natal_auth::service::AuthService;
use natal_auth::trail::{AuditQuery, AuditTrail};
use natal_core::authz::{DashboardSegregation, DashboardView};
use natal_core::capability::{Capability, CapabilitySet};
use natal_core::crypto::CryptoService;
use natal_core::error::NatalError;
use natal_core::models::role::{CreateRole, UpdateRole};
use natal_core::models::user::{CreateUser, Principal};
use natal_core::repository::{Pagination, RoleRepository, UserRepository};
use natal_db::repository::{
    SurrealAuditLogRepository, SurrealRoleRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Users = SurrealUserRepository<Db>;
type Roles = SurrealRoleRepository<Db>;
type Log = SurrealAuditLogRepository<Db>;

struct Fixture {
    admin: AdminService<Users, Roles, Log>,
    auth: AuthService<Users, Roles, Log>,
    trail: AuditTrail<Log>,
    users: Users,
    roles: Roles,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    natal_db::run_migrations(&db).await.unwrap();
    natal_db::seed_default_roles(&db).await.unwrap();

    let crypto = CryptoService::from_secret(b"admin-service-test-secret").unwrap();
    let config = AuthConfig::default();
    let trail = AuditTrail::new(
        SurrealAuditLogRepository::new(db.clone()),
        crypto,
        config.audit_query_limit,
    );
    let users = SurrealUserRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db.clone());

    Fixture {
        admin: AdminService::new(users.clone(), roles.clone(), trail.clone(), config.clone()),
        auth: AuthService::new(users.clone(), roles.clone(), trail.clone(), config),
        trail,
        users,
        roles,
    }
}

async fn principal_with(fx: &Fixture, username: &str, role: &str, superuser: bool) -> Principal {
    let role = fx.roles.get_by_name(role).await.unwrap();
    let user = fx
        .users
        .create(CreateUser {
            username: username.into(),
            email: format!("{username}@hospital.cl"),
            full_name: "Usuario de Prueba".into(),
            password_hash: password::hash_password("bootstrap-password", None).unwrap(),
            role_id: Some(role.id),
            is_superuser: superuser,
        })
        .await
        .unwrap();
    fx.auth.principal(user.id).await.unwrap()
}

fn new_user(username: &str, role_id: Option<Uuid>) -> NewUser {
    NewUser {
        username: username.into(),
        email: format!("{username}@hospital.cl"),
        full_name: "Nueva Matrona".into(),
        password: "turno-de-noche".into(),
        role_id,
        is_superuser: false,
    }
}

async fn count(fx: &Fixture, viewer: &Principal, action: &str) -> usize {
    fx.trail
        .query(
            viewer,
            AuditQuery {
                action: Some(action.into()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn created_user_can_log_in_and_is_audited() {
    let fx = setup().await;
    let admin = principal_with(&fx, "admin", "Admin Sistema", false).await;
    let matrona = fx.roles.get_by_name("Matrona Clínica").await.unwrap();

    let user = fx
        .admin
        .create_user(&admin, new_user("matrona2", Some(matrona.id)), Some("10.0.0.1"))
        .await
        .unwrap();
    assert!(user.active);
    assert!(user.password_hash.starts_with("$argon2id$"));

    let logged_in = fx
        .auth
        .login(natal_auth::LoginInput {
            username: "matrona2".into(),
            password: "turno-de-noche".into(),
            ip_address: None,
        })
        .await
        .unwrap();
    assert!(logged_in.has(Capability::CreateBirth));
    assert_eq!(count(&fx, &admin, "CREATE_USER").await, 1);
}

#[tokio::test]
async fn creating_users_requires_manage_users() {
    let fx = setup().await;
    let admin = principal_with(&fx, "admin", "Admin Sistema", false).await;
    let supervisor = principal_with(&fx, "supervisora", "Supervisor", false).await;

    let err = fx
        .admin
        .create_user(&supervisor, new_user("intruso", None), Some("10.0.0.9"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NatalError::AuthorizationDenied {
            capability: Capability::ManageUsers,
            ..
        }
    ));
    assert!(fx.users.get_by_username("intruso").await.is_err());
    assert_eq!(count(&fx, &admin, "ACCESS_DENIED").await, 1);
}

#[tokio::test]
async fn unknown_role_is_a_referential_error() {
    let fx = setup().await;
    let admin = principal_with(&fx, "admin", "Admin Sistema", false).await;

    let err = fx
        .admin
        .create_user(&admin, new_user("matrona2", Some(Uuid::new_v4())), None)
        .await
        .unwrap_err();
    assert!(matches!(err, NatalError::Referential { .. }));
}

#[tokio::test]
async fn short_passwords_are_rejected() {
    let fx = setup().await;
    let admin = principal_with(&fx, "admin", "Admin Sistema", false).await;
    let mut input = new_user("matrona2", None);
    input.password = "corta".into();

    let err = fx.admin.create_user(&admin, input, None).await.unwrap_err();
    assert!(matches!(err, NatalError::Validation { .. }));
}

#[tokio::test]
async fn only_superusers_create_superusers() {
    let fx = setup().await;
    let admin = principal_with(&fx, "admin", "Admin Sistema", false).await;
    let root = principal_with(&fx, "root", "Admin Sistema", true).await;
    let mut input = new_user("root2", None);
    input.is_superuser = true;

    assert!(fx.admin.create_user(&admin, input.clone(), None).await.is_err());
    let created = fx.admin.create_user(&root, input, None).await.unwrap();
    assert!(created.is_superuser);
}

#[tokio::test]
async fn deactivation_refuses_self_and_superusers() {
    let fx = setup().await;
    let admin = principal_with(&fx, "admin", "Admin Sistema", false).await;
    let root = principal_with(&fx, "root", "Admin Sistema", true).await;
    let matrona = principal_with(&fx, "matrona1", "Matrona Clínica", false).await;

    assert!(matches!(
        fx.admin.deactivate_user(&admin, admin.id(), None).await,
        Err(NatalError::Validation { .. })
    ));
    assert!(matches!(
        fx.admin.deactivate_user(&admin, root.id(), None).await,
        Err(NatalError::Validation { .. })
    ));

    let user = fx
        .admin
        .deactivate_user(&admin, matrona.id(), None)
        .await
        .unwrap();
    assert!(!user.active);
    assert_eq!(count(&fx, &admin, "DEACTIVATE_USER").await, 1);
}

#[tokio::test]
async fn assign_role_changes_capabilities() {
    let fx = setup().await;
    let admin = principal_with(&fx, "admin", "Admin Sistema", false).await;
    let matrona = principal_with(&fx, "matrona1", "Matrona Clínica", false).await;
    assert!(!matrona.has(Capability::ViewAllBirths));

    let supervisor = fx.roles.get_by_name("Supervisor").await.unwrap();
    fx.admin
        .assign_role(&admin, matrona.id(), Some(supervisor.id), None)
        .await
        .unwrap();

    let promoted = fx.auth.principal(matrona.id()).await.unwrap();
    assert!(promoted.has(Capability::ViewAllBirths));
    assert_eq!(DashboardSegregation::resolve(&promoted), DashboardView::Both);
    assert_eq!(count(&fx, &admin, "UPDATE_USER_ROLE").await, 1);

    fx.admin
        .assign_role(&admin, matrona.id(), None, None)
        .await
        .unwrap();
    let stripped = fx.auth.principal(matrona.id()).await.unwrap();
    assert!(stripped.capabilities().is_empty());
}

#[tokio::test]
async fn admin_role_with_clinical_dashboard_is_rejected() {
    let fx = setup().await;
    let root = principal_with(&fx, "root", "Admin Sistema", true).await;

    let err = fx
        .admin
        .create_role(
            &root,
            CreateRole {
                name: "Admin Sistema Regional".into(),
                description: String::new(),
                capabilities: [Capability::ManageUsers, Capability::ViewClinicalDashboard]
                    .into_iter()
                    .collect(),
            },
            None,
        )
        .await
        .unwrap_err();
    match err {
        NatalError::SegregationViolation { capability, .. } => {
            assert_eq!(capability, Capability::ViewClinicalDashboard);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fx.roles.get_by_name("Admin Sistema Regional").await.is_err());
}

#[tokio::test]
async fn role_lifecycle_respects_references() {
    let fx = setup().await;
    let admin = principal_with(&fx, "admin", "Admin Sistema", false).await;

    let role = fx
        .admin
        .create_role(
            &admin,
            CreateRole {
                name: "Matrona Urgencia".into(),
                description: "urgencias".into(),
                capabilities: CapabilitySet::new().with(Capability::CreateBirth),
            },
            None,
        )
        .await
        .unwrap();

    let role = fx
        .admin
        .update_role(
            &admin,
            role.id,
            UpdateRole {
                capabilities: Some(
                    CapabilitySet::new()
                        .with(Capability::CreateBirth)
                        .with(Capability::EditPartogram),
                ),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert!(role.has(Capability::EditPartogram));

    let holder = fx
        .admin
        .create_user(&admin, new_user("matrona3", Some(role.id)), None)
        .await
        .unwrap();
    assert!(matches!(
        fx.admin.delete_role(&admin, role.id, None).await,
        Err(NatalError::Referential { .. })
    ));

    fx.admin
        .assign_role(&admin, holder.id, None, None)
        .await
        .unwrap();
    fx.admin.delete_role(&admin, role.id, None).await.unwrap();
    assert!(fx.roles.get_by_id(role.id).await.is_err());

    let listed = fx
        .admin
        .list_roles(&admin, Pagination::default(), None)
        .await
        .unwrap();
    assert_eq!(listed.total, 4);
    for action in ["CREATE_ROLE", "UPDATE_ROLE", "DELETE_ROLE"] {
        assert_eq!(count(&fx, &admin, action).await, 1, "{action}");
    }
}
