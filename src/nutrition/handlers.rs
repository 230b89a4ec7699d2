use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{
    dto::{NutritionProfileIn, NutritionProfileOut},
    repo,
    repo_types::ProfileFields,
    services::{compute_targets, NutritionTargets},
};
use crate::{
    auth::{AuthUser, WriteAccess},
    error::{AppError, AppResult},
    extract::Json,
    state::AppState,
};

pub fn nutrition_routes() -> Router<AppState> {
    Router::new()
        .route("/profile/me", get(get_profile_me).put(put_profile_me))
        .route("/targets/me", get(get_targets_me))
        .route("/targets/preview", post(preview_targets))
}

#[instrument(skip(state))]
pub async fn get_profile_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<NutritionProfileOut>> {
    repo::get_profile(&state.db, auth.tenant_id, auth.user_id)
        .await?
        .map(|row| Json(row.into()))
        .ok_or_else(|| AppError::not_found("nutrition_profile_not_found"))
}

#[instrument(skip(state, payload))]
pub async fn put_profile_me(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Json(payload): Json<NutritionProfileIn>,
) -> AppResult<Json<NutritionProfileOut>> {
    let profile = payload.validate(today()).map_err(|errors| {
        warn!(user_id = %auth.user_id, %errors, "nutrition profile rejected");
        AppError::Validation(errors)
    })?;

    let row = repo::upsert_profile(
        &state.db,
        auth.tenant_id,
        auth.user_id,
        &ProfileFields::from(&profile),
    )
    .await?;
    info!(user_id = %auth.user_id, profile_id = %row.id, "nutrition profile saved");
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
pub async fn get_targets_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<NutritionTargets>> {
    let row = repo::get_profile(&state.db, auth.tenant_id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("nutrition_profile_not_found"))?;
    let targets = compute_targets(&row.to_input(), today())?;
    Ok(Json(targets))
}

/// Targets for a posted profile, nothing persisted.
#[instrument(skip(payload))]
pub async fn preview_targets(
    _auth: AuthUser,
    Json(payload): Json<NutritionProfileIn>,
) -> AppResult<Json<NutritionTargets>> {
    Ok(Json(compute_targets(&payload, today())?))
}

fn today() -> time::Date {
    OffsetDateTime::now_utc().date()
}
