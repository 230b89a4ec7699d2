use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NutritionProfileRow, ProfileFields};

const PROFILE_COLUMNS: &str = "id, tenant_id, user_id, sex, birth_date, height_cm, weight_kg, \
     activity_level, goal, override_kcal, override_protein_g, override_carbs_g, override_fat_g, \
     created_at, updated_at";

pub async fn get_profile(
    db: &PgPool,
    tenant_id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<Option<NutritionProfileRow>> {
    sqlx::query_as::<_, NutritionProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM nutrition_profiles WHERE tenant_id = $1 AND user_id = $2"
    ))
    .bind(tenant_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// One profile per (tenant, user); a second write replaces every field.
pub async fn upsert_profile(
    db: &PgPool,
    tenant_id: Uuid,
    user_id: Uuid,
    fields: &ProfileFields,
) -> sqlx::Result<NutritionProfileRow> {
    sqlx::query_as::<_, NutritionProfileRow>(&format!(
        r#"
        INSERT INTO nutrition_profiles
            (id, tenant_id, user_id, sex, birth_date, height_cm, weight_kg, activity_level, goal,
             override_kcal, override_protein_g, override_carbs_g, override_fat_g)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT ON CONSTRAINT uq_nutrition_profiles_tenant_user DO UPDATE
        SET sex = EXCLUDED.sex,
            birth_date = EXCLUDED.birth_date,
            height_cm = EXCLUDED.height_cm,
            weight_kg = EXCLUDED.weight_kg,
            activity_level = EXCLUDED.activity_level,
            goal = EXCLUDED.goal,
            override_kcal = EXCLUDED.override_kcal,
            override_protein_g = EXCLUDED.override_protein_g,
            override_carbs_g = EXCLUDED.override_carbs_g,
            override_fat_g = EXCLUDED.override_fat_g,
            updated_at = now()
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(user_id)
    .bind(fields.sex)
    .bind(fields.birth_date)
    .bind(fields.height_cm)
    .bind(fields.weight_kg)
    .bind(fields.activity_level)
    .bind(fields.goal)
    .bind(fields.override_kcal)
    .bind(fields.override_protein_g)
    .bind(fields.override_carbs_g)
    .bind(fields.override_fat_g)
    .fetch_one(db)
    .await
}
