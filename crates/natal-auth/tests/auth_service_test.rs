//! Integration tests for login, logout and audit review.

use natal_auth::config::AuthConfig;
use natal_auth::password;
use natal_auth::service::{AuthService, LoginInput, TwoFactorEvent};
use natal_auth::trail::{AuditQuery, AuditTrail};
use natal_core::crypto::CryptoService;
use natal_core::error::NatalError;
use natal_core::models::user::{CreateUser, Principal, UpdateUser};
use natal_core::repository::{RoleRepository, UserRepository};
use natal_db::repository::{
    SurrealAuditLogRepository, SurrealRoleRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Auth = AuthService<
    SurrealUserRepository<Db>,
    SurrealRoleRepository<Db>,
    SurrealAuditLogRepository<Db>,
>;

struct Fixture {
    auth: Auth,
    trail: AuditTrail<SurrealAuditLogRepository<Db>>,
    users: SurrealUserRepository<Db>,
    roles: SurrealRoleRepository<Db>,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    natal_db::run_migrations(&db).await.unwrap();
    natal_db::seed_default_roles(&db).await.unwrap();

    let crypto = CryptoService::from_secret(b"auth-service-test-secret").unwrap();
    let config = AuthConfig::default();
    let trail = AuditTrail::new(
        SurrealAuditLogRepository::new(db.clone()),
        crypto,
        config.audit_query_limit,
    );
    let users = SurrealUserRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db.clone());
    let auth = AuthService::new(users.clone(), roles.clone(), trail.clone(), config);

    Fixture {
        auth,
        trail,
        users,
        roles,
    }
}

async fn add_user(fx: &Fixture, username: &str, password: &str, role: &str) -> Uuid {
    let role = fx.roles.get_by_name(role).await.unwrap();
    fx.users
        .create(CreateUser {
            username: username.into(),
            email: format!("{username}@hospital.cl"),
            full_name: "Usuario de Prueba".into(),
            password_hash: password::hash_password(password, None).unwrap(),
            role_id: Some(role.id),
            is_superuser: false,
        })
        .await
        .unwrap()
        .id
}

async fn auditor(fx: &Fixture) -> Principal {
    let id = add_user(fx, "auditor", "auditor-password", "Admin Sistema").await;
    fx.auth.principal(id).await.unwrap()
}

fn login(username: &str, password: &str) -> LoginInput {
    LoginInput {
        username: username.into(),
        password: password.into(),
        ip_address: Some("10.0.0.7".into()),
    }
}

fn actions(action: &str) -> AuditQuery {
    AuditQuery {
        action: Some(action.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn login_resolves_role_and_is_audited() {
    let fx = setup().await;
    let id = add_user(&fx, "matrona1", "correct horse", "Matrona Clínica").await;

    let principal = fx.auth.login(login("matrona1", "correct horse")).await.unwrap();
    assert_eq!(principal.id(), id);
    assert_eq!(
        principal.role.as_ref().map(|r| r.name.as_str()),
        Some("Matrona Clínica")
    );

    let viewer = auditor(&fx).await;
    let rows = fx.trail.query(&viewer, actions("LOGIN"), None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].actor_id, id);
    assert_eq!(rows[0].ip_address.as_deref(), Some("10.0.0.7"));
}

#[tokio::test]
async fn wrong_password_is_audited_against_the_account() {
    let fx = setup().await;
    let id = add_user(&fx, "matrona1", "correct horse", "Matrona Clínica").await;

    let err = fx.auth.login(login("matrona1", "wrong horse")).await.unwrap_err();
    assert!(matches!(err, NatalError::AuthenticationFailed { .. }));

    let viewer = auditor(&fx).await;
    let rows = fx
        .trail
        .query(&viewer, actions("LOGIN_FAILED"), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].actor_id, id);
    assert_eq!(rows[0].detail.as_deref(), Some("wrong password"));
    assert!(
        fx.trail
            .query(&viewer, actions("LOGIN"), None)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_the_same() {
    let fx = setup().await;
    add_user(&fx, "matrona1", "correct horse", "Matrona Clínica").await;

    let unknown = fx.auth.login(login("nadie", "correct horse")).await.unwrap_err();
    let wrong = fx.auth.login(login("matrona1", "nope")).await.unwrap_err();
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn inactive_account_cannot_log_in() {
    let fx = setup().await;
    let id = add_user(&fx, "matrona1", "correct horse", "Matrona Clínica").await;
    fx.users
        .update(
            id,
            UpdateUser {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = fx.auth.login(login("matrona1", "correct horse")).await.unwrap_err();
    match err {
        NatalError::AuthenticationFailed { reason } => assert!(reason.contains("inactive")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn logout_and_two_factor_events_are_audited() {
    let fx = setup().await;
    add_user(&fx, "matrona1", "correct horse", "Matrona Clínica").await;
    let principal = fx.auth.login(login("matrona1", "correct horse")).await.unwrap();

    fx.auth
        .record_two_factor_event(&principal, TwoFactorEvent::Enabled, Some("10.0.0.7"))
        .await
        .unwrap();
    fx.auth
        .record_two_factor_event(&principal, TwoFactorEvent::Failed, Some("10.0.0.7"))
        .await
        .unwrap();
    fx.auth.logout(&principal, Some("10.0.0.7")).await.unwrap();

    let viewer = auditor(&fx).await;
    for action in ["2FA_ENABLED", "2FA_FAILED", "LOGOUT"] {
        let rows = fx.trail.query(&viewer, actions(action), None).await.unwrap();
        assert_eq!(rows.len(), 1, "{action}");
        assert_eq!(rows[0].actor_id, principal.id());
    }
}

#[tokio::test]
async fn clinical_staff_cannot_read_the_trail() {
    let fx = setup().await;
    add_user(&fx, "matrona1", "correct horse", "Matrona Clínica").await;
    let principal = fx.auth.login(login("matrona1", "correct horse")).await.unwrap();

    let err = fx
        .trail
        .query(&principal, AuditQuery::default(), Some("10.0.0.7"))
        .await
        .unwrap_err();
    assert!(matches!(err, NatalError::AuthorizationDenied { .. }));

    let viewer = auditor(&fx).await;
    let rows = fx
        .trail
        .query(&viewer, actions("ACCESS_DENIED"), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].actor_id, principal.id());
    assert_eq!(rows[0].detail.as_deref(), Some("missing capability: view_audit"));
}

#[tokio::test]
async fn free_text_search_covers_username_and_ip() {
    let fx = setup().await;
    add_user(&fx, "matrona1", "correct horse", "Matrona Clínica").await;
    add_user(&fx, "medico1", "correct horse", "Médico").await;
    fx.auth.login(login("matrona1", "correct horse")).await.unwrap();
    fx.auth
        .login(LoginInput {
            username: "medico1".into(),
            password: "correct horse".into(),
            ip_address: Some("192.168.1.20".into()),
        })
        .await
        .unwrap();

    let viewer = auditor(&fx).await;
    let by_name = fx
        .trail
        .query(
            &viewer,
            AuditQuery {
                text: Some("MATRONA".into()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].actor_username, "matrona1");

    let by_ip = fx
        .trail
        .query(
            &viewer,
            AuditQuery {
                text: Some("192.168".into()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(by_ip.len(), 1);
    assert_eq!(by_ip[0].actor_username, "medico1");
}
