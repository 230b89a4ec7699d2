use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{DishTemplateFields, DishTemplateRow, IngredientFields, IngredientRow, NamedRef};
use super::services::{kcal_density_warning, MacroDensity, MacroTotals};
use crate::error::FieldErrors;

const MAX_NAME_LEN: usize = 200;
/// Pure fat is about 900 kcal per 100 g.
const MAX_KCAL_PER_100G: f64 = 900.0;
const MAX_GRAMS_PER_100G: f64 = 100.0;
const MAX_QUANTITY_G: f64 = 10_000.0;
const MAX_SERVING_SIZE_G: f64 = 10_000.0;

#[derive(Debug, Deserialize)]
pub struct IngredientIn {
    pub name: String,
    pub kcal_per_100g: f64,
    pub protein_g_per_100g: f64,
    pub carbs_g_per_100g: f64,
    pub fat_g_per_100g: f64,
    #[serde(default)]
    pub serving_size_g: Option<f64>,
}

impl IngredientIn {
    pub fn validate(&self) -> Result<IngredientFields, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = self.name.trim();
        check_name(&mut errors, name);

        for (field, value, max) in [
            ("kcal_per_100g", self.kcal_per_100g, MAX_KCAL_PER_100G),
            ("protein_g_per_100g", self.protein_g_per_100g, MAX_GRAMS_PER_100G),
            ("carbs_g_per_100g", self.carbs_g_per_100g, MAX_GRAMS_PER_100G),
            ("fat_g_per_100g", self.fat_g_per_100g, MAX_GRAMS_PER_100G),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(field, "must_be_non_negative");
            } else if value > max {
                errors.push(field, "out_of_range");
            }
        }
        if let Some(size) = self.serving_size_g {
            if !size.is_finite() || size <= 0.0 {
                errors.push("serving_size_g", "must_be_positive");
            } else if size > MAX_SERVING_SIZE_G {
                errors.push("serving_size_g", "out_of_range");
            }
        }

        errors.into_result(IngredientFields {
            name: name.to_string(),
            density: MacroDensity {
                kcal: self.kcal_per_100g,
                protein_g: self.protein_g_per_100g,
                carbs_g: self.carbs_g_per_100g,
                fat_g: self.fat_g_per_100g,
            },
            serving_size_g: self.serving_size_g,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct IngredientOut {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub kcal_per_100g: f64,
    pub protein_g_per_100g: f64,
    pub carbs_g_per_100g: f64,
    pub fat_g_per_100g: f64,
    pub serving_size_g: Option<f64>,
    pub warnings: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<IngredientRow> for IngredientOut {
    fn from(r: IngredientRow) -> Self {
        let warnings = kcal_density_warning(&r.density()).into_iter().collect();
        Self {
            id: r.id,
            tenant_id: r.tenant_id,
            name: r.name,
            kcal_per_100g: r.kcal_per_100g,
            protein_g_per_100g: r.protein_g_per_100g,
            carbs_g_per_100g: r.carbs_g_per_100g,
            fat_g_per_100g: r.fat_g_per_100g,
            serving_size_g: r.serving_size_g,
            warnings,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DishTemplateItemIn {
    pub ingredient_id: String,
    pub quantity_g: f64,
}

#[derive(Debug, Deserialize)]
pub struct DishTemplateIn {
    pub name: String,
    pub items: Vec<DishTemplateItemIn>,
}

impl DishTemplateIn {
    pub fn validate(&self) -> Result<DishTemplateFields, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = self.name.trim();
        check_name(&mut errors, name);

        if self.items.is_empty() {
            errors.push("items", "required");
        }
        let mut items = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match Uuid::parse_str(item.ingredient_id.trim()) {
                Ok(id) => items.push((id, item.quantity_g)),
                Err(_) if !errors.has("items.ingredient_id") => {
                    errors.push("items.ingredient_id", "invalid_uuid")
                }
                Err(_) => {}
            }
            if !errors.has("items.quantity_g") {
                if !(item.quantity_g.is_finite() && item.quantity_g > 0.0) {
                    errors.push("items.quantity_g", "must_be_positive");
                } else if item.quantity_g > MAX_QUANTITY_G {
                    errors.push("items.quantity_g", "out_of_range");
                }
            }
        }

        errors.into_result(DishTemplateFields {
            name: name.to_string(),
            items,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DishTemplateItemOut {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub quantity_g: f64,
    pub totals: MacroTotals,
}

#[derive(Debug, Serialize)]
pub struct DishTemplateOut {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub items: Vec<DishTemplateItemOut>,
    pub totals: MacroTotals,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct DishTemplateListItemOut {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<DishTemplateRow> for DishTemplateListItemOut {
    fn from(r: DishTemplateRow) -> Self {
        Self {
            id: r.id,
            tenant_id: r.tenant_id,
            name: r.name,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsedByOut {
    pub id: Uuid,
    pub name: String,
}

impl From<NamedRef> for UsedByOut {
    fn from(r: NamedRef) -> Self {
        Self { id: r.id, name: r.name }
    }
}

fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.is_empty() {
        errors.push("name", "required");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push("name", "too_long");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;

    fn ingredient(name: &str, kcal: f64) -> IngredientIn {
        IngredientIn {
            name: name.into(),
            kcal_per_100g: kcal,
            protein_g_per_100g: 1.0,
            carbs_g_per_100g: 2.0,
            fat_g_per_100g: 0.5,
            serving_size_g: None,
        }
    }

    #[test]
    fn ingredient_name_is_trimmed() {
        let fields = ingredient("  Oats ", 389.0).validate().unwrap();
        assert_eq!(fields.name, "Oats");
        assert_eq!(fields.density.kcal, 389.0);
    }

    #[test]
    fn ingredient_rejects_negative_density_and_blank_name() {
        let err = ingredient("   ", -1.0).validate().unwrap_err();
        assert!(err.has("name"));
        assert!(err.has("kcal_per_100g"));
    }

    #[test]
    fn ingredient_densities_have_physical_ceilings() {
        let mut input = ingredient("Lard", 901.0);
        input.fat_g_per_100g = 100.5;
        input.serving_size_g = Some(1e12);
        let err = input.validate().unwrap_err();
        assert!(err.0.contains(&FieldError::new("kcal_per_100g", "out_of_range")));
        assert!(err.0.contains(&FieldError::new("fat_g_per_100g", "out_of_range")));
        assert!(err.has("serving_size_g"));
        assert!(!err.has("protein_g_per_100g"));

        let mut pure_fat = ingredient("Oil", 900.0);
        pure_fat.fat_g_per_100g = 100.0;
        assert!(pure_fat.validate().is_ok());
    }

    #[test]
    fn dish_item_quantity_has_a_ceiling() {
        let input = DishTemplateIn {
            name: "Vat".into(),
            items: vec![DishTemplateItemIn {
                ingredient_id: Uuid::new_v4().to_string(),
                quantity_g: 10_000.5,
            }],
        };
        let err = input.validate().unwrap_err();
        assert_eq!(err.0, vec![FieldError::new("items.quantity_g", "out_of_range")]);
    }

    #[test]
    fn serving_size_must_be_positive() {
        let mut input = ingredient("Egg", 143.0);
        input.serving_size_g = Some(0.0);
        assert!(input.validate().unwrap_err().has("serving_size_g"));
    }

    #[test]
    fn dish_template_checks_items() {
        let input = DishTemplateIn {
            name: "Bowl".into(),
            items: vec![
                DishTemplateItemIn { ingredient_id: "nope".into(), quantity_g: 10.0 },
                DishTemplateItemIn { ingredient_id: Uuid::new_v4().to_string(), quantity_g: 0.0 },
            ],
        };
        let err = input.validate().unwrap_err();
        assert!(err.has("items.ingredient_id"));
        assert!(err.has("items.quantity_g"));

        let empty = DishTemplateIn { name: "Bowl".into(), items: vec![] };
        assert!(empty.validate().unwrap_err().has("items"));
    }

    #[test]
    fn dish_template_keeps_item_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let input = DishTemplateIn {
            name: "Salad".into(),
            items: vec![
                DishTemplateItemIn { ingredient_id: b.to_string(), quantity_g: 80.0 },
                DishTemplateItemIn { ingredient_id: a.to_string(), quantity_g: 20.0 },
            ],
        };
        let fields = input.validate().unwrap();
        assert_eq!(fields.items, vec![(b, 80.0), (a, 20.0)]);
    }
}
