//! Integration tests for the Session repository.

use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenantgate_core::error::GateError;
use tenantgate_core::models::session::{CreateSession, SessionFilter, UpdateSession};
use tenantgate_core::repository::{Pagination, SessionRepository};
use tenantgate_db::repository::SurrealSessionRepository;
use uuid::Uuid;

async fn setup() -> SurrealSessionRepository<Db> {
    setup_with_db().await.0
}

async fn setup_with_db() -> (SurrealSessionRepository<Db>, Surreal<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenantgate_db::run_migrations(&db).await.unwrap();
    (SurrealSessionRepository::new(db.clone()), db)
}

fn new_session(user_id: Uuid, role_id: Option<Uuid>, expires_in: Duration) -> CreateSession {
    CreateSession {
        project_id: Some(Uuid::new_v4()),
        env_id: None,
        client_platform_id: None,
        client_type_id: Some(Uuid::new_v4()),
        user_id,
        role_id,
        ip: Some("127.0.0.1".into()),
        data: None,
        expires_at: Utc::now() + expires_in,
    }
}

#[tokio::test]
async fn create_and_get_session() {
    let repo = setup().await;
    let user_id = Uuid::new_v4();

    let session = repo
        .create(new_session(user_id, None, Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(session.user_id, user_id);
    assert!(!session.is_changed);
    assert_eq!(session.ip.as_deref(), Some("127.0.0.1"));
    assert!(session.data.is_object());

    let fetched = repo.get_by_id(session.id).await.unwrap();
    assert_eq!(fetched.id, session.id);
    assert_eq!(fetched.client_type_id, session.client_type_id);
}

#[tokio::test]
async fn update_applies_only_given_fields() {
    let repo = setup().await;
    let session = repo
        .create(new_session(Uuid::new_v4(), None, Duration::hours(1)))
        .await
        .unwrap();

    let role_id = Uuid::new_v4();
    let updated = repo
        .update(
            session.id,
            UpdateSession {
                role_id: Some(role_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.role_id, Some(role_id));
    assert_eq!(updated.project_id, session.project_id);
    assert_eq!(updated.client_type_id, session.client_type_id);
}

#[tokio::test]
async fn update_missing_session_is_not_found() {
    let repo = setup().await;
    let err = repo
        .update(Uuid::new_v4(), UpdateSession::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::NotFound { .. }));
}

#[tokio::test]
async fn delete_session() {
    let repo = setup().await;
    let session = repo
        .create(new_session(Uuid::new_v4(), None, Duration::hours(1)))
        .await
        .unwrap();

    repo.delete(session.id).await.unwrap();
    assert!(repo.get_by_id(session.id).await.is_err());

    let err = repo.delete(session.id).await.unwrap_err();
    assert!(matches!(err, GateError::NotFound { .. }));
}

#[tokio::test]
async fn delete_expired_by_user_only_touches_that_user() {
    let repo = setup().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    for _ in 0..3 {
        repo.create(new_session(alice, None, Duration::hours(-1)))
            .await
            .unwrap();
    }
    let live = repo
        .create(new_session(alice, None, Duration::hours(1)))
        .await
        .unwrap();
    repo.create(new_session(bob, None, Duration::hours(-1)))
        .await
        .unwrap();

    let purged = repo.delete_expired_by_user(alice).await.unwrap();
    assert_eq!(purged, 3);

    let remaining = repo.list_by_user(alice).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, live.id);

    assert_eq!(repo.list_by_user(bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_by_role_id_flags_matching_sessions() {
    let repo = setup().await;
    let role = Uuid::new_v4();
    let other_role = Uuid::new_v4();

    let a = repo
        .create(new_session(Uuid::new_v4(), Some(role), Duration::hours(1)))
        .await
        .unwrap();
    let b = repo
        .create(new_session(Uuid::new_v4(), Some(role), Duration::hours(1)))
        .await
        .unwrap();
    let c = repo
        .create(new_session(Uuid::new_v4(), Some(other_role), Duration::hours(1)))
        .await
        .unwrap();

    let touched = repo.update_by_role_id(role, true).await.unwrap();
    assert_eq!(touched, 2);

    assert!(repo.get_by_id(a.id).await.unwrap().is_changed);
    assert!(repo.get_by_id(b.id).await.unwrap().is_changed);
    assert!(!repo.get_by_id(c.id).await.unwrap().is_changed);
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let repo = setup().await;
    let user_id = Uuid::new_v4();
    for _ in 0..5 {
        repo.create(new_session(user_id, None, Duration::hours(1)))
            .await
            .unwrap();
    }
    repo.create(new_session(Uuid::new_v4(), None, Duration::hours(1)))
        .await
        .unwrap();

    let page = repo
        .list(
            SessionFilter {
                user_id: Some(user_id),
                ..Default::default()
            },
            Pagination {
                offset: 0,
                limit: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|s| s.user_id == user_id));

    let everything = repo
        .list(SessionFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(everything.total, 6);
}

#[tokio::test]
async fn failed_role_flag_write_is_an_error() {
    let (repo, db) = setup_with_db().await;
    let role_id = Uuid::new_v4();
    let session = repo
        .create(new_session(Uuid::new_v4(), Some(role_id), Duration::hours(1)))
        .await
        .unwrap();

    // Reject every attempt to flag a session.
    db.query(
        "DEFINE FIELD OVERWRITE is_changed ON TABLE session TYPE bool \
         DEFAULT false ASSERT $value = false",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let err = repo.update_by_role_id(role_id, true).await.unwrap_err();
    assert!(matches!(err, GateError::Database(_)));

    let unchanged = repo.get_by_id(session.id).await.unwrap();
    assert!(!unchanged.is_changed);
}

#[tokio::test]
async fn failed_expired_purge_is_an_error() {
    let (repo, db) = setup_with_db().await;
    let user_id = Uuid::new_v4();
    let stale = repo
        .create(new_session(user_id, None, -Duration::hours(1)))
        .await
        .unwrap();

    db.query(
        "DEFINE EVENT OVERWRITE keep_sessions ON TABLE session \
         WHEN $event = \"DELETE\" THEN { THROW \"sessions are locked\" }",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let err = repo.delete_expired_by_user(user_id).await.unwrap_err();
    assert!(matches!(err, GateError::Database(_)));
    assert!(repo.get_by_id(stale.id).await.is_ok());
}
