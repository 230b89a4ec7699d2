use axum::{extract::State, routing::get, Router};
use tracing::{instrument, warn};

use super::{dto::WorkerClientOut, repo};
use crate::{
    auth::{services::UserRole, AuthUser},
    error::{AppError, AppResult},
    extract::{Json, Query},
    query::ListQuery,
    state::AppState,
};

pub fn worker_routes() -> Router<AppState> {
    Router::new().route("/clients", get(list_clients))
}

#[instrument(skip(state))]
pub async fn list_clients(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<WorkerClientOut>>> {
    if auth.role != UserRole::Worker {
        warn!(user_id = %auth.user_id, "client account asked for the worker client list");
        return Err(AppError::forbidden("worker_only"));
    }
    let rows = repo::list_clients(
        &state.db,
        auth.tenant_id,
        q.name_pattern().as_deref(),
        q.limit(),
        q.offset(),
    )
    .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
