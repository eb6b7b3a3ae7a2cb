//! Integration tests for the User repository.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenantgate_core::error::GateError;
use tenantgate_core::models::user::{CreateUser, HashType, UserStatus};
use tenantgate_core::repository::UserRepository;
use tenantgate_db::repository::SurrealUserRepository;
use uuid::Uuid;

async fn setup() -> SurrealUserRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenantgate_db::run_migrations(&db).await.unwrap();
    SurrealUserRepository::new(db)
}

fn new_user(login: &str) -> CreateUser {
    CreateUser {
        project_id: Some(Uuid::new_v4()),
        login: login.into(),
        email: Some(format!("{login}@example.com")),
        phone: None,
        password_hash: "$argon2id$v=19$m=16,t=2,p=1$c2FsdHNhbHQ$aGFzaA".into(),
        hash_type: HashType::Argon2id,
        active: 1,
        client_type_id: None,
        role_id: Some(Uuid::new_v4()),
    }
}

#[tokio::test]
async fn create_and_get_user() {
    let repo = setup().await;
    let input = new_user("alice1");
    let project_id = input.project_id;

    let user = repo.create(input).await.unwrap();
    assert_eq!(user.login, "alice1");
    assert_eq!(user.hash_type, HashType::Argon2id);
    assert_eq!(user.project_id, project_id);
    assert_eq!(user.status(), UserStatus::Active);

    let by_id = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(by_id.login, "alice1");

    let by_login = repo.get_by_login("alice1").await.unwrap();
    assert_eq!(by_login.id, user.id);
}

#[tokio::test]
async fn unknown_login_is_not_found() {
    let repo = setup().await;
    let err = repo.get_by_login("nobody").await.unwrap_err();
    assert!(matches!(err, GateError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_login_rejected() {
    let repo = setup().await;
    repo.create(new_user("alice1")).await.unwrap();
    assert!(repo.create(new_user("alice1")).await.is_err());
}

#[tokio::test]
async fn update_password_switches_hash_type() {
    let repo = setup().await;
    let user = repo.create(new_user("alice1")).await.unwrap();

    repo.update_password(user.id, "$2b$04$abcdefghijklmnopqrstuv".into(), HashType::Bcrypt)
        .await
        .unwrap();

    let updated = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(updated.hash_type, HashType::Bcrypt);
    assert!(updated.password_hash.starts_with("$2b$"));
}

#[tokio::test]
async fn update_password_missing_user() {
    let repo = setup().await;
    let err = repo
        .update_password(Uuid::new_v4(), "x".into(), HashType::Bcrypt)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::NotFound { .. }));
}

#[tokio::test]
async fn set_active_changes_status() {
    let repo = setup().await;
    let user = repo.create(new_user("alice1")).await.unwrap();

    repo.set_active(user.id, -1).await.unwrap();
    let user = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(user.status(), UserStatus::Deactivated);

    repo.set_active(user.id, 0).await.unwrap();
    let user = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(user.status(), UserStatus::NotActivated);
}
