#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::FromRef;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use nutriplan::app::build_app;
use nutriplan::auth::services::{AccessMode, JwtKeys, UserRole};
use nutriplan::auth::{AccountStanding, AccountStore};
use nutriplan::state::AppState;

/// Full router over `AppState::fake()`; nothing here talks to a database.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::fake();
    (build_app(state.clone()), state)
}

/// Fixed account standings keyed by user id; anyone else reads as deleted.
#[derive(Default)]
pub struct StaticAccounts(pub HashMap<Uuid, AccountStanding>);

#[async_trait]
impl AccountStore for StaticAccounts {
    async fn standing(
        &self,
        _tenant_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<AccountStanding>> {
        Ok(self.0.get(&user_id).copied())
    }
}

pub fn test_app_with_accounts(accounts: StaticAccounts) -> (Router, AppState) {
    let state = AppState::fake().with_accounts(Arc::new(accounts));
    (build_app(state.clone()), state)
}

pub fn token_for(state: &AppState, role: UserRole, access_mode: AccessMode) -> String {
    token_for_user(state, Uuid::new_v4(), Uuid::new_v4(), role, access_mode)
}

pub fn token_for_user(
    state: &AppState,
    user_id: Uuid,
    tenant_id: Uuid,
    role: UserRole,
    access_mode: AccessMode,
) -> String {
    JwtKeys::from_ref(state)
        .sign(user_id, tenant_id, role, access_mode)
        .unwrap()
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str, token: Option<&str>) -> Response<Body> {
    send(app, Method::GET, uri, token, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn sample_profile() -> serde_json::Value {
    serde_json::json!({
        "sex": "male",
        "birth_date": "1990-01-01",
        "height_cm": 180,
        "weight_kg": 80.0,
        "activity_level": "moderate",
        "goal": "maintain"
    })
}
