use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{
    DishItemRow, DishTemplateFields, DishTemplateRow, IngredientFields, IngredientRow, NamedRef,
};
use super::services::MacroDensity;

const INGREDIENT_COLUMNS: &str = "id, tenant_id, name, kcal_per_100g, protein_g_per_100g, \
     carbs_g_per_100g, fat_g_per_100g, serving_size_g, created_at, updated_at";

pub async fn list_ingredients(
    db: &PgPool,
    tenant_id: Uuid,
    name_pattern: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<IngredientRow>> {
    sqlx::query_as::<_, IngredientRow>(&format!(
        r#"
        SELECT {INGREDIENT_COLUMNS}
        FROM ingredients
        WHERE tenant_id = $1 AND ($2::text IS NULL OR name ILIKE $2)
        ORDER BY name ASC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(tenant_id)
    .bind(name_pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn get_ingredient(
    db: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<IngredientRow>> {
    sqlx::query_as::<_, IngredientRow>(&format!(
        "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE tenant_id = $1 AND id = $2"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_ingredient(
    db: &PgPool,
    tenant_id: Uuid,
    fields: &IngredientFields,
) -> sqlx::Result<IngredientRow> {
    sqlx::query_as::<_, IngredientRow>(&format!(
        r#"
        INSERT INTO ingredients (id, tenant_id, name, kcal_per_100g, protein_g_per_100g,
                                 carbs_g_per_100g, fat_g_per_100g, serving_size_g)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {INGREDIENT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(&fields.name)
    .bind(fields.density.kcal)
    .bind(fields.density.protein_g)
    .bind(fields.density.carbs_g)
    .bind(fields.density.fat_g)
    .bind(fields.serving_size_g)
    .fetch_one(db)
    .await
}

pub async fn update_ingredient(
    db: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
    fields: &IngredientFields,
) -> sqlx::Result<Option<IngredientRow>> {
    sqlx::query_as::<_, IngredientRow>(&format!(
        r#"
        UPDATE ingredients
        SET name = $3, kcal_per_100g = $4, protein_g_per_100g = $5, carbs_g_per_100g = $6,
            fat_g_per_100g = $7, serving_size_g = $8, updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {INGREDIENT_COLUMNS}
        "#
    ))
    .bind(tenant_id)
    .bind(id)
    .bind(&fields.name)
    .bind(fields.density.kcal)
    .bind(fields.density.protein_g)
    .bind(fields.density.carbs_g)
    .bind(fields.density.fat_g)
    .bind(fields.serving_size_g)
    .fetch_optional(db)
    .await
}

pub async fn ingredient_in_use(db: &PgPool, tenant_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM dish_template_items WHERE tenant_id = $1 AND ingredient_id = $2
        )
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_one(db)
    .await
}

/// Returns `false` when nothing matched.
pub async fn delete_ingredient(db: &PgPool, tenant_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM ingredients WHERE tenant_id = $1 AND id = $2")
        .bind(tenant_id)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Dish templates that reference the ingredient, by name.
pub async fn dishes_using_ingredient(
    db: &PgPool,
    tenant_id: Uuid,
    ingredient_id: Uuid,
) -> sqlx::Result<Vec<NamedRef>> {
    sqlx::query_as::<_, NamedRef>(
        r#"
        SELECT DISTINCT d.id, d.name
        FROM dish_templates d
        JOIN dish_template_items i ON i.dish_template_id = d.id
        WHERE d.tenant_id = $1 AND i.tenant_id = $1 AND i.ingredient_id = $2
        ORDER BY d.name ASC
        "#,
    )
    .bind(tenant_id)
    .bind(ingredient_id)
    .fetch_all(db)
    .await
}

pub async fn densities_by_id(
    db: &PgPool,
    tenant_id: Uuid,
    ids: &[Uuid],
) -> sqlx::Result<HashMap<Uuid, MacroDensity>> {
    let rows = sqlx::query_as::<_, IngredientRow>(&format!(
        "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE tenant_id = $1 AND id = ANY($2)"
    ))
    .bind(tenant_id)
    .bind(ids)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|r| (r.id, r.density())).collect())
}

pub async fn list_dish_templates(
    db: &PgPool,
    tenant_id: Uuid,
    name_pattern: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<DishTemplateRow>> {
    sqlx::query_as::<_, DishTemplateRow>(
        r#"
        SELECT id, tenant_id, name, created_at, updated_at
        FROM dish_templates
        WHERE tenant_id = $1 AND ($2::text IS NULL OR name ILIKE $2)
        ORDER BY name ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(tenant_id)
    .bind(name_pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

/// All tenant dishes, for the planner's suggestion ranking.
pub async fn all_dish_names(db: &PgPool, tenant_id: Uuid) -> sqlx::Result<Vec<NamedRef>> {
    sqlx::query_as::<_, NamedRef>(
        "SELECT id, name FROM dish_templates WHERE tenant_id = $1 ORDER BY name ASC",
    )
    .bind(tenant_id)
    .fetch_all(db)
    .await
}

pub async fn dish_names_by_id(
    db: &PgPool,
    tenant_id: Uuid,
    ids: &[Uuid],
) -> sqlx::Result<HashMap<Uuid, String>> {
    let rows = sqlx::query_as::<_, NamedRef>(
        "SELECT id, name FROM dish_templates WHERE tenant_id = $1 AND id = ANY($2)",
    )
    .bind(tenant_id)
    .bind(ids)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|r| (r.id, r.name)).collect())
}

pub async fn get_dish_template(
    db: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<(DishTemplateRow, Vec<DishItemRow>)>> {
    let Some(template) = sqlx::query_as::<_, DishTemplateRow>(
        r#"
        SELECT id, tenant_id, name, created_at, updated_at
        FROM dish_templates
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(db)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, DishItemRow>(
        r#"
        SELECT i.ingredient_id, g.name AS ingredient_name, i.quantity_g,
               g.kcal_per_100g, g.protein_g_per_100g, g.carbs_g_per_100g, g.fat_g_per_100g
        FROM dish_template_items i
        JOIN ingredients g ON g.id = i.ingredient_id AND g.tenant_id = i.tenant_id
        WHERE i.tenant_id = $1 AND i.dish_template_id = $2
        ORDER BY i.position ASC, i.created_at ASC
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_all(db)
    .await?;

    Ok(Some((template, items)))
}

pub async fn insert_dish_template(
    db: &PgPool,
    tenant_id: Uuid,
    fields: &DishTemplateFields,
) -> sqlx::Result<Uuid> {
    let id = Uuid::new_v4();
    let mut tx = db.begin().await?;
    sqlx::query("INSERT INTO dish_templates (id, tenant_id, name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(tenant_id)
        .bind(&fields.name)
        .execute(&mut *tx)
        .await?;
    insert_dish_items(&mut tx, tenant_id, id, &fields.items).await?;
    tx.commit().await?;
    Ok(id)
}

/// Replaces name and items; `false` when the template does not exist.
pub async fn update_dish_template(
    db: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
    fields: &DishTemplateFields,
) -> sqlx::Result<bool> {
    let mut tx = db.begin().await?;
    let res = sqlx::query(
        "UPDATE dish_templates SET name = $3, updated_at = now() WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant_id)
    .bind(id)
    .bind(&fields.name)
    .execute(&mut *tx)
    .await?;
    if res.rows_affected() == 0 {
        return Ok(false);
    }
    sqlx::query("DELETE FROM dish_template_items WHERE tenant_id = $1 AND dish_template_id = $2")
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_dish_items(&mut tx, tenant_id, id, &fields.items).await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn delete_dish_template(db: &PgPool, tenant_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM dish_templates WHERE tenant_id = $1 AND id = $2")
        .bind(tenant_id)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

async fn insert_dish_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    tenant_id: Uuid,
    dish_template_id: Uuid,
    items: &[(Uuid, f64)],
) -> sqlx::Result<()> {
    for (position, (ingredient_id, quantity_g)) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO dish_template_items
                (id, tenant_id, dish_template_id, ingredient_id, quantity_g, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(dish_template_id)
        .bind(ingredient_id)
        .bind(quantity_g)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
