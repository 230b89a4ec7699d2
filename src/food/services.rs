//! Macro aggregation: ingredient densities (per 100 g) scaled by quantity and summed per dish.
//!
//! Each item contribution is rounded to hundredths and the dish sum is carried in
//! integer hundredths, so totals do not depend on item order.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

/// Macro density of an ingredient, per 100 g.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroDensity {
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MacroTotals {
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MacroError {
    #[error("quantity_g must not be negative (got {0})")]
    NegativeQuantity(f64),
    #[error("quantity_g must be a finite number")]
    NonFiniteQuantity,
    #[error("ingredient {0} not found")]
    MissingIngredient(Uuid),
    #[error("macro total out of range")]
    Overflow,
}

/// Largest magnitude carried, in hundredths. Well past any real dish.
const MAX_CENTIS: f64 = 1e15;

/// Totals in hundredths of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Centis {
    kcal: i64,
    protein: i64,
    carbs: i64,
    fat: i64,
}

impl Centis {
    fn checked_add(self, other: Centis) -> Result<Centis, MacroError> {
        Ok(Centis {
            kcal: self.kcal.checked_add(other.kcal).ok_or(MacroError::Overflow)?,
            protein: self.protein.checked_add(other.protein).ok_or(MacroError::Overflow)?,
            carbs: self.carbs.checked_add(other.carbs).ok_or(MacroError::Overflow)?,
            fat: self.fat.checked_add(other.fat).ok_or(MacroError::Overflow)?,
        })
    }

    fn into_totals(self) -> MacroTotals {
        MacroTotals {
            kcal: self.kcal as f64 / 100.0,
            protein_g: self.protein as f64 / 100.0,
            carbs_g: self.carbs as f64 / 100.0,
            fat_g: self.fat as f64 / 100.0,
        }
    }
}

fn to_centis(value: f64) -> Result<i64, MacroError> {
    let centis = (value * 100.0).round();
    if !centis.is_finite() || centis.abs() > MAX_CENTIS {
        return Err(MacroError::Overflow);
    }
    Ok(centis as i64)
}

fn item_centis(density: &MacroDensity, quantity_g: f64) -> Result<Centis, MacroError> {
    if !quantity_g.is_finite() {
        return Err(MacroError::NonFiniteQuantity);
    }
    if quantity_g < 0.0 {
        return Err(MacroError::NegativeQuantity(quantity_g));
    }
    let factor = quantity_g / 100.0;
    Ok(Centis {
        kcal: to_centis(density.kcal * factor)?,
        protein: to_centis(density.protein_g * factor)?,
        carbs: to_centis(density.carbs_g * factor)?,
        fat: to_centis(density.fat_g * factor)?,
    })
}

/// Scales a density by `quantity_g / 100`, rounded to 2 decimals.
pub fn compute_item_macros(density: &MacroDensity, quantity_g: f64) -> Result<MacroTotals, MacroError> {
    item_centis(density, quantity_g).map(Centis::into_totals)
}

/// Sums scaled contributions. An empty list yields zero totals.
pub fn compute_dish_totals<'a, I>(items: I) -> Result<MacroTotals, MacroError>
where
    I: IntoIterator<Item = (&'a MacroDensity, f64)>,
{
    items
        .into_iter()
        .try_fold(Centis::default(), |acc, (density, qty)| {
            item_centis(density, qty).and_then(|c| acc.checked_add(c))
        })
        .map(Centis::into_totals)
}

/// Like [`compute_dish_totals`], but looks each ingredient up by id.
/// A dangling reference is an error, never a silent zero.
pub fn resolve_dish_totals(
    items: &[(Uuid, f64)],
    densities: &HashMap<Uuid, MacroDensity>,
) -> Result<MacroTotals, MacroError> {
    let resolved = items
        .iter()
        .map(|(id, qty)| {
            densities
                .get(id)
                .map(|d| (d, *qty))
                .ok_or(MacroError::MissingIngredient(*id))
        })
        .collect::<Result<Vec<_>, _>>()?;
    compute_dish_totals(resolved)
}

/// Advisory 4/4/9 check; `Some(warning)` when the declared kcal is far from the macro-derived energy.
pub fn kcal_density_warning(density: &MacroDensity) -> Option<String> {
    let expected = 4.0 * density.protein_g + 4.0 * density.carbs_g + 9.0 * density.fat_g;
    let delta = (density.kcal - expected).abs();
    let tolerance = (expected.max(density.kcal) * 0.2).max(10.0);
    if delta > tolerance {
        Some(format!("kcal_density_inconsistent;expected_kcal={}", expected.round() as i64))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn density(kcal: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> MacroDensity {
        MacroDensity { kcal, protein_g, carbs_g, fat_g }
    }

    #[test]
    fn chicken_breast_at_150g() {
        let chicken = density(165.0, 31.0, 0.0, 3.6);
        let totals = compute_item_macros(&chicken, 150.0).unwrap();
        assert_eq!(totals.kcal, 247.5);
        assert_eq!(totals.protein_g, 46.5);
        assert_eq!(totals.carbs_g, 0.0);
        assert_eq!(totals.fat_g, 5.4);
    }

    #[test]
    fn item_totals_round_to_two_decimals() {
        let d = density(200.0, 10.0, 30.0, 5.0);
        let totals = compute_item_macros(&d, 150.0).unwrap();
        assert_eq!(totals, MacroTotals { kcal: 300.0, protein_g: 15.0, carbs_g: 45.0, fat_g: 7.5 });

        let odd = density(33.333, 1.111, 0.0, 0.0);
        let totals = compute_item_macros(&odd, 10.0).unwrap();
        assert_eq!(totals.kcal, 3.33);
        assert_eq!(totals.protein_g, 0.11);
    }

    #[test]
    fn dish_totals_sum_items() {
        let rice = density(100.0, 0.0, 25.0, 0.0);
        let beef = density(250.0, 20.0, 0.0, 10.0);
        let totals = compute_dish_totals([(&rice, 200.0), (&beef, 100.0)]).unwrap();
        assert_eq!(totals, MacroTotals { kcal: 450.0, protein_g: 20.0, carbs_g: 50.0, fat_g: 10.0 });
    }

    #[test]
    fn empty_dish_is_all_zero() {
        let totals = compute_dish_totals(std::iter::empty()).unwrap();
        assert_eq!(totals, MacroTotals::default());
    }

    #[test]
    fn dish_totals_are_order_independent() {
        let a = density(123.45, 7.77, 13.13, 3.33);
        let b = density(57.1, 0.3, 12.9, 0.1);
        let c = density(884.0, 0.0, 0.0, 100.0);
        let items = vec![(&a, 37.3), (&b, 212.9), (&c, 13.7)];
        let forward = compute_dish_totals(items.clone()).unwrap();

        let mut reversed = items.clone();
        reversed.reverse();
        assert_eq!(compute_dish_totals(reversed).unwrap(), forward);

        let rotated = vec![items[1], items[2], items[0]];
        assert_eq!(compute_dish_totals(rotated).unwrap(), forward);
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let d = density(100.0, 1.0, 1.0, 1.0);
        assert_eq!(
            compute_item_macros(&d, -1.0),
            Err(MacroError::NegativeQuantity(-1.0))
        );
        assert_eq!(
            compute_dish_totals([(&d, 10.0), (&d, -5.0)]),
            Err(MacroError::NegativeQuantity(-5.0))
        );
        assert_eq!(compute_item_macros(&d, f64::NAN), Err(MacroError::NonFiniteQuantity));
    }

    #[test]
    fn absurd_densities_are_rejected_instead_of_saturating() {
        let huge = density(5e16, 0.0, 0.0, 0.0);
        assert_eq!(
            compute_dish_totals([(&huge, 100.0), (&huge, 100.0)]),
            Err(MacroError::Overflow)
        );
        assert_eq!(
            compute_item_macros(&density(1e300, 1.0, 1.0, 1.0), 100.0),
            Err(MacroError::Overflow)
        );
        assert_eq!(
            compute_item_macros(&density(100.0, 1.0, 1.0, f64::INFINITY), 10.0),
            Err(MacroError::Overflow)
        );
    }

    #[test]
    fn many_large_items_sum_without_overflow() {
        let butter = density(900.0, 100.0, 100.0, 100.0);
        let items = vec![(&butter, 10_000.0); 500];
        let totals = compute_dish_totals(items).unwrap();
        assert_eq!(totals.kcal, 45_000_000.0);
    }

    #[test]
    fn zero_quantity_contributes_nothing() {
        let d = density(100.0, 1.0, 1.0, 1.0);
        assert_eq!(compute_item_macros(&d, 0.0).unwrap(), MacroTotals::default());
    }

    #[test]
    fn missing_ingredient_is_a_validation_failure() {
        let known = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        let mut densities = HashMap::new();
        densities.insert(known, density(100.0, 10.0, 0.0, 0.0));

        let ok = resolve_dish_totals(&[(known, 50.0)], &densities).unwrap();
        assert_eq!(ok.kcal, 50.0);

        let err = resolve_dish_totals(&[(known, 50.0), (unknown, 10.0)], &densities).unwrap_err();
        assert_eq!(err, MacroError::MissingIngredient(unknown));
    }

    #[test]
    fn kcal_density_warning_is_advisory() {
        // 31*4 + 3.6*9 = 156.4, close enough to 165
        assert!(kcal_density_warning(&density(165.0, 31.0, 0.0, 3.6)).is_none());
        let warning = kcal_density_warning(&density(500.0, 10.0, 10.0, 1.0)).unwrap();
        assert!(warning.starts_with("kcal_density_inconsistent"));
        assert!(warning.ends_with("expected_kcal=89"));
    }
}
