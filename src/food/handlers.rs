use axum::{extract::State, http::StatusCode, routing::get, Router};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        DishTemplateIn, DishTemplateItemOut, DishTemplateListItemOut, DishTemplateOut,
        IngredientIn, IngredientOut, UsedByOut,
    },
    repo,
    repo_types::{DishItemRow, DishTemplateFields, DishTemplateRow},
    services::{compute_dish_totals, compute_item_macros, resolve_dish_totals, MacroError},
};
use crate::{
    auth::{AuthUser, WriteAccess},
    common::StatusOut,
    error::{is_foreign_key_violation, AppError, AppResult, FieldErrors},
    extract::{Json, Path, Query},
    query::ListQuery,
    state::AppState,
};

pub fn food_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients).post(create_ingredient))
        .route(
            "/ingredients/:id",
            get(get_ingredient).put(update_ingredient).delete(delete_ingredient),
        )
        .route("/ingredients/:id/used-by", get(ingredient_used_by))
        .route("/dish-templates", get(list_dish_templates).post(create_dish_template))
        .route(
            "/dish-templates/:id",
            get(get_dish_template)
                .put(update_dish_template)
                .delete(delete_dish_template),
        )
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<IngredientOut>>> {
    let rows = repo::list_ingredients(
        &state.db,
        auth.tenant_id,
        q.name_pattern().as_deref(),
        q.limit(),
        q.offset(),
    )
    .await?;
    Ok(Json(rows.into_iter().map(IngredientOut::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Json(payload): Json<IngredientIn>,
) -> AppResult<(StatusCode, Json<IngredientOut>)> {
    let fields = payload.validate()?;
    let row = repo::insert_ingredient(&state.db, auth.tenant_id, &fields).await?;
    info!(ingredient_id = %row.id, tenant_id = %auth.tenant_id, "ingredient created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IngredientOut>> {
    repo::get_ingredient(&state.db, auth.tenant_id, id)
        .await?
        .map(|row| Json(row.into()))
        .ok_or_else(|| AppError::not_found("ingredient_not_found"))
}

#[instrument(skip(state, payload))]
pub async fn update_ingredient(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Path(id): Path<Uuid>,
    Json(payload): Json<IngredientIn>,
) -> AppResult<Json<IngredientOut>> {
    let fields = payload.validate()?;
    let row = repo::update_ingredient(&state.db, auth.tenant_id, id, &fields)
        .await?
        .ok_or_else(|| AppError::not_found("ingredient_not_found"))?;
    info!(ingredient_id = %id, "ingredient updated");
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StatusOut>> {
    if repo::ingredient_in_use(&state.db, auth.tenant_id, id).await? {
        warn!(ingredient_id = %id, "delete refused, ingredient referenced by a dish");
        return Err(AppError::conflict("ingredient_in_use"));
    }
    match repo::delete_ingredient(&state.db, auth.tenant_id, id).await {
        Ok(true) => {}
        Ok(false) => return Err(AppError::not_found("ingredient_not_found")),
        // a dish item was added between the check and the delete
        Err(err) if is_foreign_key_violation(&err) => {
            warn!(ingredient_id = %id, "delete refused by foreign key");
            return Err(AppError::conflict("ingredient_in_use"));
        }
        Err(err) => return Err(err.into()),
    }
    info!(ingredient_id = %id, "ingredient deleted");
    Ok(Json(StatusOut::ok()))
}

#[instrument(skip(state))]
pub async fn ingredient_used_by(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<UsedByOut>>> {
    if repo::get_ingredient(&state.db, auth.tenant_id, id).await?.is_none() {
        return Err(AppError::not_found("ingredient_not_found"));
    }
    let dishes = repo::dishes_using_ingredient(&state.db, auth.tenant_id, id).await?;
    Ok(Json(dishes.into_iter().map(UsedByOut::from).collect()))
}

#[instrument(skip(state))]
pub async fn list_dish_templates(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<DishTemplateListItemOut>>> {
    let rows = repo::list_dish_templates(
        &state.db,
        auth.tenant_id,
        q.name_pattern().as_deref(),
        q.limit(),
        q.offset(),
    )
    .await?;
    Ok(Json(rows.into_iter().map(DishTemplateListItemOut::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_dish_template(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DishTemplateOut>> {
    let (row, items) = repo::get_dish_template(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("dish_template_not_found"))?;
    Ok(Json(dish_template_out(row, items)?))
}

#[instrument(skip(state, payload))]
pub async fn create_dish_template(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Json(payload): Json<DishTemplateIn>,
) -> AppResult<(StatusCode, Json<DishTemplateOut>)> {
    let fields = payload.validate()?;
    ensure_ingredients_exist(&state, auth.tenant_id, &fields).await?;

    let id = repo::insert_dish_template(&state.db, auth.tenant_id, &fields).await?;
    let (row, items) = repo::get_dish_template(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("dish template {id} vanished after insert"))?;
    info!(dish_template_id = %id, items = items.len(), "dish template created");
    Ok((StatusCode::CREATED, Json(dish_template_out(row, items)?)))
}

#[instrument(skip(state, payload))]
pub async fn update_dish_template(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Path(id): Path<Uuid>,
    Json(payload): Json<DishTemplateIn>,
) -> AppResult<Json<DishTemplateOut>> {
    let fields = payload.validate()?;
    ensure_ingredients_exist(&state, auth.tenant_id, &fields).await?;

    if !repo::update_dish_template(&state.db, auth.tenant_id, id, &fields).await? {
        return Err(AppError::not_found("dish_template_not_found"));
    }
    let (row, items) = repo::get_dish_template(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("dish_template_not_found"))?;
    info!(dish_template_id = %id, "dish template updated");
    Ok(Json(dish_template_out(row, items)?))
}

#[instrument(skip(state))]
pub async fn delete_dish_template(
    State(state): State<AppState>,
    WriteAccess(auth): WriteAccess,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StatusOut>> {
    if !repo::delete_dish_template(&state.db, auth.tenant_id, id).await? {
        return Err(AppError::not_found("dish_template_not_found"));
    }
    info!(dish_template_id = %id, "dish template deleted");
    Ok(Json(StatusOut::ok()))
}

/// Every referenced ingredient must belong to the caller's tenant.
async fn ensure_ingredients_exist(
    state: &AppState,
    tenant_id: Uuid,
    fields: &DishTemplateFields,
) -> AppResult<()> {
    let ids: Vec<Uuid> = fields.items.iter().map(|(id, _)| *id).collect();
    let densities = repo::densities_by_id(&state.db, tenant_id, &ids).await?;
    match resolve_dish_totals(&fields.items, &densities) {
        Ok(_) => Ok(()),
        Err(MacroError::MissingIngredient(id)) => {
            warn!(ingredient_id = %id, "dish references unknown ingredient");
            let mut errors = FieldErrors::new();
            errors.push("items.ingredient_id", "not_found");
            Err(errors.into())
        }
        Err(MacroError::Overflow) => {
            warn!("dish totals out of range");
            let mut errors = FieldErrors::new();
            errors.push("items.quantity_g", "out_of_range");
            Err(errors.into())
        }
        Err(other) => {
            let mut errors = FieldErrors::new();
            errors.push("items.quantity_g", "must_be_positive");
            warn!(error = %other, "dish item quantity rejected");
            Err(errors.into())
        }
    }
}

fn dish_template_out(row: DishTemplateRow, items: Vec<DishItemRow>) -> AppResult<DishTemplateOut> {
    let densities: Vec<_> = items.iter().map(|i| (i.density(), i.quantity_g)).collect();
    let totals = compute_dish_totals(densities.iter().map(|(d, q)| (d, *q)))
        .map_err(|e| anyhow::anyhow!("stored dish {} has bad item: {e}", row.id))?;

    let items = items
        .into_iter()
        .zip(densities.iter())
        .map(|(item, (density, qty))| {
            let totals = compute_item_macros(density, *qty)
                .map_err(|e| anyhow::anyhow!("stored dish {} has bad item: {e}", row.id))?;
            Ok(DishTemplateItemOut {
                ingredient_id: item.ingredient_id,
                ingredient_name: item.ingredient_name,
                quantity_g: item.quantity_g,
                totals,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(DishTemplateOut {
        id: row.id,
        tenant_id: row.tenant_id,
        name: row.name,
        items,
        totals,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
