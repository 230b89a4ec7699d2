use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::NutritionProfileRow;

pub use super::services::ProfileInput as NutritionProfileIn;

#[derive(Debug, Serialize)]
pub struct NutritionProfileOut {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub sex: String,
    #[serde(serialize_with = "crate::dates::iso_date")]
    pub birth_date: Date,
    pub height_cm: i32,
    pub weight_kg: f64,
    pub activity_level: String,
    pub goal: String,
    pub override_kcal: Option<i32>,
    pub override_protein_g: Option<i32>,
    pub override_carbs_g: Option<i32>,
    pub override_fat_g: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<NutritionProfileRow> for NutritionProfileOut {
    fn from(r: NutritionProfileRow) -> Self {
        Self {
            id: r.id,
            tenant_id: r.tenant_id,
            user_id: r.user_id,
            sex: r.sex,
            birth_date: r.birth_date,
            height_cm: r.height_cm,
            weight_kg: r.weight_kg,
            activity_level: r.activity_level,
            goal: r.goal,
            override_kcal: r.override_kcal,
            override_protein_g: r.override_protein_g,
            override_carbs_g: r.override_carbs_g,
            override_fat_g: r.override_fat_g,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
