//! HTTP surface tests
//!
//! Exercises the router directly with `tower::ServiceExt::oneshot`; the
//! realtime channel behavior itself is covered by the actor tests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use tally_config::{FlushConfig, RateLimitConfig};
use tally_persistence::{CounterRepository, Database, DatabaseConfig};
use tally_server_core::{build_router, CounterActor};

async fn scratch_actor(dir: &tempfile::TempDir) -> (Database, CounterRepository, CounterActor) {
    let config = DatabaseConfig {
        path: dir.path().join("tally.db").to_string_lossy().into_owned(),
        ..DatabaseConfig::default()
    };
    let database = Database::new(config).await.unwrap();
    database.migrate().await.unwrap();
    let repo = CounterRepository::new(database.pool().clone());
    let actor = CounterActor::new(
        repo.clone(),
        RateLimitConfig::default(),
        FlushConfig::default(),
    );
    (database, repo, actor)
}

#[tokio::test]
async fn count_returns_the_value_as_plain_text() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo, actor) = scratch_actor(&dir).await;
    repo.save(12).await.unwrap();

    let router = build_router(actor);
    let response = router
        .oneshot(Request::builder().uri("/count").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(content_type, "text/plain; charset=utf-8");

    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"12");
}

#[tokio::test]
async fn count_starts_at_zero_for_a_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, _repo, actor) = scratch_actor(&dir).await;

    let router = build_router(actor);
    let response = router
        .oneshot(Request::builder().uri("/count").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"0");
}

#[tokio::test]
async fn count_surfaces_storage_failures() {
    let dir = tempfile::tempdir().unwrap();
    let (database, _repo, actor) = scratch_actor(&dir).await;
    database.close().await;

    let router = build_router(actor);
    let response = router
        .oneshot(Request::builder().uri("/count").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn ws_without_upgrade_returns_426() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, _repo, actor) = scratch_actor(&dir).await;

    let router = build_router(actor);
    let response = router
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
}

#[tokio::test]
async fn unknown_paths_return_404() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, _repo, actor) = scratch_actor(&dir).await;

    let router = build_router(actor);
    let response = router
        .oneshot(
            Request::builder()
                .uri("/definitely-not-here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
