//! `ApiClient` against live local servers.

mod common;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use nutriplan::auth::services::{AccessMode, UserRole};
use nutriplan::client::{ApiClient, ClientError, Session};
use nutriplan::nutrition::services::ProfileInput;
use serde_json::json;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn stub_router() -> Router {
    Router::new()
        .route(
            "/api/auth/login",
            post(|| async {
                Json(json!({
                    "access_token": "stub-token",
                    "token_type": "bearer",
                    "access_mode": "read_only",
                    "user": {
                        "id": "7f1f4a8e-2d6b-4f57-9d7c-1b5b8f0f2a11",
                        "tenant_id": "0c2a4f9d-8e2b-4c33-a1b4-5d6e7f809102",
                        "role": "worker",
                        "email": "coach@example.com"
                    }
                }))
            }),
        )
        .route(
            "/api/auth/me",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "detail": "invalid_token", "code": "UNAUTHORIZED" })),
                )
            }),
        )
        .route(
            "/api/worker/clients",
            get(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "detail": "worker_only", "code": "FORBIDDEN" })),
                )
            }),
        )
        .route(
            "/api/planning/dish-suggestions",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        )
}

#[tokio::test]
async fn login_stores_session_and_401_clears_it() {
    let base = spawn(stub_router()).await;
    let mut client = ApiClient::new(base);

    let login = client.login(" Coach@Example.com ", "longenough").await.unwrap();
    assert_eq!(login.user.role, UserRole::Worker);
    let session = client.session().cloned().unwrap();
    assert_eq!(session.token, "stub-token");
    assert_eq!(session.access_mode, AccessMode::ReadOnly);
    assert_eq!(session.email, "coach@example.com");

    let err = client.me().await.unwrap_err();
    assert!(matches!(err, ClientError::SessionExpired));
    assert!(client.session().is_none());
}

#[tokio::test]
async fn http_errors_carry_server_detail_or_status() {
    let base = spawn(stub_router()).await;
    let mut client = ApiClient::new(base);
    client.restore(Session {
        token: "t".into(),
        access_mode: AccessMode::Active,
        email: "coach@example.com".into(),
    });

    match client.worker_clients(None).await {
        Err(ClientError::Http { status, detail }) => {
            assert_eq!(status, 403);
            assert_eq!(detail, "worker_only");
        }
        other => panic!("unexpected: {other:?}"),
    }

    match client.dish_suggestions("lunch", None).await {
        Err(ClientError::Http { status, detail }) => {
            assert_eq!(status, 502);
            assert_eq!(detail, "HTTP 502");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(client.session().is_some());
}

#[tokio::test]
async fn preview_targets_round_trips_through_the_real_router() {
    let (app, state) = common::test_app();
    let token = common::token_for(&state, UserRole::Client, AccessMode::Active);
    let base = spawn(app).await;

    let mut client = ApiClient::new(base);
    client.restore(Session {
        token,
        access_mode: AccessMode::Active,
        email: "client@example.com".into(),
    });

    let profile: ProfileInput = serde_json::from_value(common::sample_profile()).unwrap();
    let targets = client.preview_targets(&profile).await.unwrap();
    assert_eq!(targets.weekly.kcal, targets.daily.kcal * 7);
    assert!(targets.daily.protein_g > 0);
}
