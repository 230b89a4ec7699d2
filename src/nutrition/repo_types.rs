use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::services::{ProfileInput, ValidProfile};
use crate::dates::format_iso_date;

#[derive(Debug, Clone, FromRow)]
pub struct NutritionProfileRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub sex: String,
    pub birth_date: Date,
    pub height_cm: i32,
    pub weight_kg: f64,
    pub activity_level: String,
    pub goal: String,
    pub override_kcal: Option<i32>,
    pub override_protein_g: Option<i32>,
    pub override_carbs_g: Option<i32>,
    pub override_fat_g: Option<i32>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl NutritionProfileRow {
    /// Stored values go back through validation before any target math.
    pub fn to_input(&self) -> ProfileInput {
        ProfileInput {
            sex: self.sex.clone(),
            birth_date: format_iso_date(self.birth_date),
            height_cm: i64::from(self.height_cm),
            weight_kg: self.weight_kg,
            activity_level: self.activity_level.clone(),
            goal: self.goal.clone(),
            override_kcal: self.override_kcal.map(i64::from),
            override_protein_g: self.override_protein_g.map(i64::from),
            override_carbs_g: self.override_carbs_g.map(i64::from),
            override_fat_g: self.override_fat_g.map(i64::from),
        }
    }
}

/// Column values for an upsert, taken from a validated profile.
#[derive(Debug, Clone)]
pub struct ProfileFields {
    pub sex: &'static str,
    pub birth_date: Date,
    pub height_cm: i32,
    pub weight_kg: f64,
    pub activity_level: &'static str,
    pub goal: &'static str,
    pub override_kcal: Option<i32>,
    pub override_protein_g: Option<i32>,
    pub override_carbs_g: Option<i32>,
    pub override_fat_g: Option<i32>,
}

impl From<&ValidProfile> for ProfileFields {
    fn from(p: &ValidProfile) -> Self {
        Self {
            sex: p.sex.as_str(),
            birth_date: p.birth_date,
            height_cm: p.height_cm,
            weight_kg: p.weight_kg,
            activity_level: p.activity_level.as_str(),
            goal: p.goal.as_str(),
            override_kcal: p.overrides.kcal,
            override_protein_g: p.overrides.protein_g,
            override_carbs_g: p.overrides.carbs_g,
            override_fat_g: p.overrides.fat_g,
        }
    }
}
