use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        ClientWeekQuery, CreateFromTemplateIn, SlotUpdateIn, SuggestionQuery,
        WeekPlanInstanceOut, WeekPlanInstanceUpdateIn, WeekPlanTemplateIn,
        WeekPlanTemplateListItemOut, WeekPlanTemplateOut,
    },
    repo,
    services::{
        confirm_slot_write, create_instance_from_template, normalize_client_ref, normalize_slots,
        suggest_dishes, update_slot, DayKey, DishCandidate, DishRef, DishSuggestion, PlanError,
        SlotDraft, SlotUsage, WeekPlanInstance, DEFAULT_SUGGESTION_LIMIT,
    },
};
use crate::{
    auth::{AuthUser, WriteAccess},
    common::StatusOut,
    dates::parse_iso_date,
    error::{is_unique_violation, AppError, AppResult, FieldErrors},
    extract::{Json, Path, Query},
    food,
    query::ListQuery,
    state::AppState,
};

pub fn planning_routes() -> Router<AppState> {
    Router::new()
        .route("/week-plan-templates", get(list_templates).post(create_template))
        .route(
            "/week-plan-templates/:id",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/week-plan-instances/from-template", post(create_instance))
        .route("/week-plan-instances/by-client-week", get(get_instance_by_client_week))
        .route("/week-plan-instances/:id", get(get_instance).put(replace_instance))
        .route(
            "/week-plan-instances/:id/slots/:day_key/:slot_key",
            put(substitute_slot),
        )
        .route("/dish-suggestions", get(dish_suggestions))
}

#[instrument(skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<WeekPlanTemplateListItemOut>>> {
    let rows = repo::list_templates(
        &state.db,
        auth.tenant_id,
        q.name_pattern().as_deref(),
        q.limit(),
        q.offset(),
    )
    .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WeekPlanTemplateOut>> {
    Ok(Json(load_template_out(&state, auth.tenant_id, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_template(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Json(payload): Json<WeekPlanTemplateIn>,
) -> AppResult<(StatusCode, Json<WeekPlanTemplateOut>)> {
    let (name, drafts) = payload.validate()?;
    let mut slots = normalize_slots(drafts)?;
    snapshot_dish_names(&state, auth.tenant_id, &mut slots, true).await?;

    let id = repo::insert_template(&state.db, auth.tenant_id, &name, &slots).await?;
    info!(template_id = %id, slots = slots.len(), "week plan template created");
    Ok((
        StatusCode::CREATED,
        Json(load_template_out(&state, auth.tenant_id, id).await?),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_template(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Path(id): Path<Uuid>,
    Json(payload): Json<WeekPlanTemplateIn>,
) -> AppResult<Json<WeekPlanTemplateOut>> {
    let (name, drafts) = payload.validate()?;
    let mut slots = normalize_slots(drafts)?;
    snapshot_dish_names(&state, auth.tenant_id, &mut slots, true).await?;

    if !repo::replace_template(&state.db, auth.tenant_id, id, &name, &slots).await? {
        return Err(AppError::not_found("week_plan_template_not_found"));
    }
    info!(template_id = %id, slots = slots.len(), "week plan template replaced");
    Ok(Json(load_template_out(&state, auth.tenant_id, id).await?))
}

#[instrument(skip(state))]
pub async fn delete_template(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StatusOut>> {
    if !repo::delete_template(&state.db, auth.tenant_id, id).await? {
        return Err(AppError::not_found("week_plan_template_not_found"));
    }
    info!(template_id = %id, "week plan template deleted");
    Ok(Json(StatusOut::ok()))
}

#[instrument(skip(state, payload))]
pub async fn create_instance(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Json(payload): Json<CreateFromTemplateIn>,
) -> AppResult<(StatusCode, Json<WeekPlanInstanceOut>)> {
    let (template_id, week_start_date) = payload.validate()?;
    let client_ref = normalize_client_ref(&payload.client_ref)?;

    if repo::instance_exists(&state.db, auth.tenant_id, &client_ref, week_start_date).await? {
        warn!(%client_ref, %week_start_date, "week plan already exists");
        return Err(PlanError::DuplicateInstance.into());
    }

    let (row, items) = repo::get_template(&state.db, auth.tenant_id, template_id)
        .await?
        .ok_or_else(|| AppError::not_found("week_plan_template_not_found"))?;
    let template = row.into_domain(items)?;

    let instance = create_instance_from_template(
        &template,
        &client_ref,
        week_start_date,
        OffsetDateTime::now_utc(),
    )?;

    if let Err(e) = repo::insert_instance(&state.db, &instance).await {
        if is_unique_violation(&e) {
            warn!(%client_ref, %week_start_date, "week plan created concurrently");
            return Err(PlanError::DuplicateInstance.into());
        }
        return Err(e.into());
    }

    info!(
        instance_id = %instance.id,
        template_id = %template.id,
        slots = instance.items.len(),
        "week plan instance created"
    );
    Ok((StatusCode::CREATED, Json(instance.into())))
}

#[instrument(skip(state))]
pub async fn get_instance_by_client_week(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<ClientWeekQuery>,
) -> AppResult<Json<WeekPlanInstanceOut>> {
    let client_ref = normalize_client_ref(&q.client_ref)?;
    let week_start_date = parse_iso_date(&q.week_start_date).ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.push("week_start_date", "invalid_date");
        AppError::Validation(errors)
    })?;

    let (row, items) =
        repo::find_instance_by_client_week(&state.db, auth.tenant_id, &client_ref, week_start_date)
            .await?
            .ok_or_else(|| AppError::not_found("week_plan_instance_not_found"))?;
    Ok(Json(row.into_domain(items)?.into()))
}

#[instrument(skip(state))]
pub async fn get_instance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WeekPlanInstanceOut>> {
    Ok(Json(load_instance(&state, auth.tenant_id, id).await?.into()))
}

#[instrument(skip(state, payload))]
pub async fn replace_instance(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Path(id): Path<Uuid>,
    Json(payload): Json<WeekPlanInstanceUpdateIn>,
) -> AppResult<Json<WeekPlanInstanceOut>> {
    let drafts = payload.validate()?;
    let mut slots = normalize_slots(drafts)?;
    snapshot_dish_names(&state, auth.tenant_id, &mut slots, false).await?;

    if !repo::replace_instance_items(&state.db, auth.tenant_id, id, &slots).await? {
        return Err(AppError::not_found("week_plan_instance_not_found"));
    }
    info!(instance_id = %id, slots = slots.len(), "week plan instance replaced");
    Ok(Json(load_instance(&state, auth.tenant_id, id).await?.into()))
}

#[instrument(skip(state, payload))]
pub async fn substitute_slot(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Path((id, day_key, slot_key)): Path<(Uuid, String, String)>,
    Json(payload): Json<SlotUpdateIn>,
) -> AppResult<Json<WeekPlanInstanceOut>> {
    let day = DayKey::parse(&day_key).ok_or_else(|| AppError::bad_request("invalid_day_key"))?;
    let dish_template_id = Uuid::parse_str(payload.dish_template_id.trim()).map_err(|_| {
        let mut errors = FieldErrors::new();
        errors.push("dish_template_id", "invalid_uuid");
        AppError::Validation(errors)
    })?;

    let names =
        food::repo::dish_names_by_id(&state.db, auth.tenant_id, &[dish_template_id]).await?;
    let dish_name = names
        .get(&dish_template_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("dish_template_not_found"))?;

    let instance = load_instance(&state, auth.tenant_id, id).await?;
    let updated = update_slot(
        instance,
        day,
        &slot_key,
        DishRef {
            dish_template_id,
            dish_name,
        },
    )?;
    let slot = updated
        .slot(day, slot_key.trim())
        .ok_or_else(|| anyhow::anyhow!("slot vanished after substitution"))?;

    let rows = repo::update_instance_slot(&state.db, auth.tenant_id, id, slot).await?;
    confirm_slot_write(rows, day, &slot.slot_key)?;
    info!(instance_id = %id, %day, slot_key = %slot.slot_key, %dish_template_id, "slot substituted");
    Ok(Json(load_instance(&state, auth.tenant_id, id).await?.into()))
}

#[instrument(skip(state))]
pub async fn dish_suggestions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<SuggestionQuery>,
) -> AppResult<Json<Vec<DishSuggestion>>> {
    let candidates: Vec<DishCandidate> = food::repo::all_dish_names(&state.db, auth.tenant_id)
        .await?
        .into_iter()
        .map(|d| DishCandidate { id: d.id, name: d.name })
        .collect();
    let history: Vec<SlotUsage> = repo::slot_history(&state.db, auth.tenant_id)
        .await?
        .into_iter()
        .map(|u| SlotUsage {
            slot_key: u.slot_key,
            dish_template_id: u.dish_template_id,
        })
        .collect();

    let suggestions = suggest_dishes(
        &q.slot_key,
        q.query.as_deref(),
        &candidates,
        &history,
        q.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT),
    )?;
    Ok(Json(suggestions))
}

/// Fills in dish names from the tenant's dish templates. Templates only keep a
/// name next to an id; instances keep a free-text name when no id is given.
async fn snapshot_dish_names(
    state: &AppState,
    tenant_id: Uuid,
    slots: &mut [SlotDraft],
    template: bool,
) -> AppResult<()> {
    let mut ids: Vec<Uuid> = slots.iter().filter_map(|s| s.dish_template_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let names = if ids.is_empty() {
        Default::default()
    } else {
        food::repo::dish_names_by_id(&state.db, tenant_id, &ids).await?
    };
    if names.len() != ids.len() {
        warn!(requested = ids.len(), found = names.len(), "plan references unknown dish");
        return Err(AppError::not_found("dish_template_not_found"));
    }

    for slot in slots.iter_mut() {
        match slot.dish_template_id {
            Some(id) => slot.dish_name = names.get(&id).cloned(),
            None if template => slot.dish_name = None,
            None => {}
        }
    }
    Ok(())
}

async fn load_template_out(
    state: &AppState,
    tenant_id: Uuid,
    id: Uuid,
) -> AppResult<WeekPlanTemplateOut> {
    let (row, items) = repo::get_template(&state.db, tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("week_plan_template_not_found"))?;
    let (created_at, updated_at) = (row.created_at, row.updated_at);
    Ok(WeekPlanTemplateOut::new(row.into_domain(items)?, created_at, updated_at))
}

async fn load_instance(state: &AppState, tenant_id: Uuid, id: Uuid) -> AppResult<WeekPlanInstance> {
    let (row, items) = repo::get_instance(&state.db, tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("week_plan_instance_not_found"))?;
    Ok(row.into_domain(items)?)
}
