use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::services::MacroDensity;

#[derive(Debug, Clone, FromRow)]
pub struct IngredientRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub kcal_per_100g: f64,
    pub protein_g_per_100g: f64,
    pub carbs_g_per_100g: f64,
    pub fat_g_per_100g: f64,
    pub serving_size_g: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl IngredientRow {
    pub fn density(&self) -> MacroDensity {
        MacroDensity {
            kcal: self.kcal_per_100g,
            protein_g: self.protein_g_per_100g,
            carbs_g: self.carbs_g_per_100g,
            fat_g: self.fat_g_per_100g,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DishTemplateRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// A dish item joined with the macro density of its ingredient.
#[derive(Debug, Clone, FromRow)]
pub struct DishItemRow {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub quantity_g: f64,
    pub kcal_per_100g: f64,
    pub protein_g_per_100g: f64,
    pub carbs_g_per_100g: f64,
    pub fat_g_per_100g: f64,
}

impl DishItemRow {
    pub fn density(&self) -> MacroDensity {
        MacroDensity {
            kcal: self.kcal_per_100g,
            protein_g: self.protein_g_per_100g,
            carbs_g: self.carbs_g_per_100g,
            fat_g: self.fat_g_per_100g,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NamedRef {
    pub id: Uuid,
    pub name: String,
}

/// Validated ingredient fields ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientFields {
    pub name: String,
    pub density: MacroDensity,
    pub serving_size_g: Option<f64>,
}

/// Validated dish template ready to be written; items keep request order.
#[derive(Debug, Clone, PartialEq)]
pub struct DishTemplateFields {
    pub name: String,
    pub items: Vec<(Uuid, f64)>,
}
