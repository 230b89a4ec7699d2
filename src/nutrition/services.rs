//! Profile-to-targets mapping.
//!
//! Resting energy by Mifflin-St Jeor, scaled by an activity multiplier and a goal
//! factor, then split into protein/carbs/fat grams by goal-specific shares.
//! Overrides replace the matching daily value verbatim.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use time::Date;

use crate::dates::parse_iso_date;
use crate::error::{AppError, FieldErrors};

const MAX_HEIGHT_CM: i64 = 250;
const MAX_WEIGHT_KG: f64 = 500.0;
const MAX_OVERRIDE_KCAL: i64 = 20_000;
const MAX_OVERRIDE_GRAMS: i64 = 2_000;

pub const KCAL_SAFETY_FLOOR: i64 = 1_200;
pub const KCAL_PLAUSIBLE_CEILING: i64 = 5_000;
const ENERGY_MISMATCH_KCAL: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "male" => Some(Sex::Male),
            "female" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }

    fn bmr_offset(self) -> f64 {
        match self {
            Sex::Male => 5.0,
            Sex::Female => -161.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    VeryActive,
    Athlete,
}

impl ActivityLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sedentary" => Some(ActivityLevel::Sedentary),
            "light" => Some(ActivityLevel::Light),
            "moderate" => Some(ActivityLevel::Moderate),
            "very_active" => Some(ActivityLevel::VeryActive),
            "athlete" => Some(ActivityLevel::Athlete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::VeryActive => "very_active",
            ActivityLevel::Athlete => "athlete",
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::VeryActive => 1.725,
            ActivityLevel::Athlete => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Maintain,
    Cut,
    Bulk,
}

impl Goal {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "maintain" => Some(Goal::Maintain),
            "cut" => Some(Goal::Cut),
            "bulk" => Some(Goal::Bulk),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Goal::Maintain => "maintain",
            Goal::Cut => "cut",
            Goal::Bulk => "bulk",
        }
    }

    pub fn kcal_factor(self) -> f64 {
        match self {
            Goal::Maintain => 1.0,
            Goal::Cut => 0.80,
            Goal::Bulk => 1.10,
        }
    }

    /// Share of kcal from protein, carbs and fat.
    pub fn split(self) -> (f64, f64, f64) {
        match self {
            Goal::Maintain => (0.30, 0.40, 0.30),
            Goal::Cut => (0.35, 0.35, 0.30),
            Goal::Bulk => (0.25, 0.50, 0.25),
        }
    }
}

/// Profile as submitted, before any checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileInput {
    pub sex: String,
    pub birth_date: String,
    pub height_cm: i64,
    pub weight_kg: f64,
    pub activity_level: String,
    #[serde(default = "default_goal")]
    pub goal: String,
    #[serde(default)]
    pub override_kcal: Option<i64>,
    #[serde(default)]
    pub override_protein_g: Option<i64>,
    #[serde(default)]
    pub override_carbs_g: Option<i64>,
    #[serde(default)]
    pub override_fat_g: Option<i64>,
}

fn default_goal() -> String {
    "maintain".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacroOverrides {
    pub kcal: Option<i32>,
    pub protein_g: Option<i32>,
    pub carbs_g: Option<i32>,
    pub fat_g: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidProfile {
    pub sex: Sex,
    pub birth_date: Date,
    pub height_cm: i32,
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    pub overrides: MacroOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MacroTargets {
    pub kcal: i64,
    pub protein_g: i64,
    pub carbs_g: i64,
    pub fat_g: i64,
}

impl MacroTargets {
    fn times(self, n: i64) -> Self {
        Self {
            kcal: self.kcal * n,
            protein_g: self.protein_g * n,
            carbs_g: self.carbs_g * n,
            fat_g: self.fat_g * n,
        }
    }

    /// Energy implied by the gram amounts at 4/4/9 kcal per gram.
    pub fn macro_kcal(&self) -> i64 {
        4 * self.protein_g + 4 * self.carbs_g + 9 * self.fat_g
    }
}

/// Advisory only; serialized as `code;key=value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetWarning {
    BelowSafetyFloor { daily_kcal: i64 },
    AbovePlausibleCeiling { daily_kcal: i64 },
    MacroEnergyMismatch { delta_kcal: i64 },
}

impl fmt::Display for TargetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetWarning::BelowSafetyFloor { daily_kcal } => {
                write!(f, "kcal_below_safety_floor;daily_kcal={daily_kcal}")
            }
            TargetWarning::AbovePlausibleCeiling { daily_kcal } => {
                write!(f, "kcal_above_plausible_ceiling;daily_kcal={daily_kcal}")
            }
            TargetWarning::MacroEnergyMismatch { delta_kcal } => {
                write!(f, "macro_energy_mismatch;delta_kcal={delta_kcal}")
            }
        }
    }
}

impl Serialize for TargetWarning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionTargets {
    pub daily: MacroTargets,
    pub weekly: MacroTargets,
    pub warnings: Vec<TargetWarning>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TargetsError {
    #[error("invalid profile: {0}")]
    InvalidProfile(FieldErrors),
}

impl From<TargetsError> for AppError {
    fn from(err: TargetsError) -> Self {
        match err {
            TargetsError::InvalidProfile(errors) => AppError::Validation(errors),
        }
    }
}

impl ProfileInput {
    /// Checks every field against `as_of` (for the birth date) and reports all failures at once.
    pub fn validate(&self, as_of: Date) -> Result<ValidProfile, FieldErrors> {
        let mut errors = FieldErrors::new();

        let sex = Sex::parse(self.sex.trim());
        if sex.is_none() {
            errors.push("sex", "invalid_choice");
        }
        let activity_level = ActivityLevel::parse(self.activity_level.trim());
        if activity_level.is_none() {
            errors.push("activity_level", "invalid_choice");
        }
        let goal = Goal::parse(self.goal.trim());
        if goal.is_none() {
            errors.push("goal", "invalid_choice");
        }

        let birth_date = parse_iso_date(&self.birth_date);
        match birth_date {
            None => errors.push("birth_date", "invalid_date"),
            Some(d) if d > as_of => errors.push("birth_date", "in_future"),
            Some(_) => {}
        }

        if self.height_cm <= 0 {
            errors.push("height_cm", "must_be_positive");
        } else if self.height_cm > MAX_HEIGHT_CM {
            errors.push("height_cm", "out_of_range");
        }

        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            errors.push("weight_kg", "must_be_positive");
        } else if self.weight_kg > MAX_WEIGHT_KG {
            errors.push("weight_kg", "out_of_range");
        }

        let overrides = MacroOverrides {
            kcal: check_override(&mut errors, "override_kcal", self.override_kcal, MAX_OVERRIDE_KCAL),
            protein_g: check_override(
                &mut errors,
                "override_protein_g",
                self.override_protein_g,
                MAX_OVERRIDE_GRAMS,
            ),
            carbs_g: check_override(
                &mut errors,
                "override_carbs_g",
                self.override_carbs_g,
                MAX_OVERRIDE_GRAMS,
            ),
            fat_g: check_override(&mut errors, "override_fat_g", self.override_fat_g, MAX_OVERRIDE_GRAMS),
        };

        match (sex, activity_level, goal, birth_date) {
            (Some(sex), Some(activity_level), Some(goal), Some(birth_date)) if errors.is_empty() => {
                Ok(ValidProfile {
                    sex,
                    birth_date,
                    height_cm: self.height_cm as i32,
                    weight_kg: self.weight_kg,
                    activity_level,
                    goal,
                    overrides,
                })
            }
            _ => Err(errors),
        }
    }
}

fn check_override(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<i64>,
    max: i64,
) -> Option<i32> {
    match value {
        Some(v) if v < 0 => {
            errors.push(field, "must_be_non_negative");
            None
        }
        Some(v) if v > max => {
            errors.push(field, "out_of_range");
            None
        }
        Some(v) => Some(v as i32),
        None => None,
    }
}

/// Whole years between `birth_date` and `as_of`, never negative.
pub fn age_years(birth_date: Date, as_of: Date) -> i32 {
    let mut years = as_of.year() - birth_date.year();
    if (as_of.month() as u8, as_of.day()) < (birth_date.month() as u8, birth_date.day()) {
        years -= 1;
    }
    years.max(0)
}

pub fn bmr_mifflin_st_jeor(sex: Sex, weight_kg: f64, height_cm: i32, age_years: i32) -> f64 {
    10.0 * weight_kg + 6.25 * f64::from(height_cm) - 5.0 * f64::from(age_years) + sex.bmr_offset()
}

pub fn targets_for(profile: &ValidProfile, as_of: Date) -> NutritionTargets {
    let age = age_years(profile.birth_date, as_of);
    let bmr = bmr_mifflin_st_jeor(profile.sex, profile.weight_kg, profile.height_cm, age);
    let computed_kcal =
        ((bmr * profile.activity_level.multiplier() * profile.goal.kcal_factor()).round() as i64).max(0);

    let (p_share, c_share, f_share) = profile.goal.split();
    let kcal = computed_kcal as f64;
    let computed = MacroTargets {
        kcal: computed_kcal,
        protein_g: (kcal * p_share / 4.0).round() as i64,
        carbs_g: (kcal * c_share / 4.0).round() as i64,
        fat_g: (kcal * f_share / 9.0).round() as i64,
    };

    let o = profile.overrides;
    let daily = MacroTargets {
        kcal: o.kcal.map(i64::from).unwrap_or(computed.kcal),
        protein_g: o.protein_g.map(i64::from).unwrap_or(computed.protein_g),
        carbs_g: o.carbs_g.map(i64::from).unwrap_or(computed.carbs_g),
        fat_g: o.fat_g.map(i64::from).unwrap_or(computed.fat_g),
    };

    NutritionTargets {
        daily,
        weekly: daily.times(7),
        warnings: warnings_for(&daily),
    }
}

fn warnings_for(daily: &MacroTargets) -> Vec<TargetWarning> {
    let mut warnings = Vec::new();
    if daily.kcal < KCAL_SAFETY_FLOOR {
        warnings.push(TargetWarning::BelowSafetyFloor { daily_kcal: daily.kcal });
    } else if daily.kcal > KCAL_PLAUSIBLE_CEILING {
        warnings.push(TargetWarning::AbovePlausibleCeiling { daily_kcal: daily.kcal });
    }
    let delta = daily.kcal - daily.macro_kcal();
    if delta.abs() >= ENERGY_MISMATCH_KCAL {
        warnings.push(TargetWarning::MacroEnergyMismatch { delta_kcal: delta });
    }
    warnings
}

pub fn compute_targets(input: &ProfileInput, as_of: Date) -> Result<NutritionTargets, TargetsError> {
    let profile = input.validate(as_of).map_err(TargetsError::InvalidProfile)?;
    Ok(targets_for(&profile, as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    const AS_OF: Date = date!(2024 - 06 - 15);

    fn reference_profile() -> ProfileInput {
        ProfileInput {
            sex: "male".into(),
            birth_date: "1994-01-10".into(),
            height_cm: 180,
            weight_kg: 80.0,
            activity_level: "moderate".into(),
            goal: "maintain".into(),
            override_kcal: None,
            override_protein_g: None,
            override_carbs_g: None,
            override_fat_g: None,
        }
    }

    #[test]
    fn age_counts_whole_years() {
        assert_eq!(age_years(date!(1994 - 01 - 10), AS_OF), 30);
        assert_eq!(age_years(date!(1994 - 06 - 16), AS_OF), 29);
        assert_eq!(age_years(date!(1994 - 06 - 15), AS_OF), 30);
        assert_eq!(age_years(AS_OF, AS_OF), 0);
    }

    #[test]
    fn reference_male_maintain() {
        // BMR 1780, x1.55 = 2759
        let t = compute_targets(&reference_profile(), AS_OF).unwrap();
        assert_eq!(
            t.daily,
            MacroTargets { kcal: 2759, protein_g: 207, carbs_g: 276, fat_g: 92 }
        );
        assert!(t.warnings.is_empty());
    }

    #[test]
    fn weekly_is_seven_times_daily() {
        for goal in ["maintain", "cut", "bulk"] {
            let mut p = reference_profile();
            p.goal = goal.into();
            let t = compute_targets(&p, AS_OF).unwrap();
            assert_eq!(t.weekly.kcal, t.daily.kcal * 7);
            assert_eq!(t.weekly.protein_g, t.daily.protein_g * 7);
            assert_eq!(t.weekly.carbs_g, t.daily.carbs_g * 7);
            assert_eq!(t.weekly.fat_g, t.daily.fat_g * 7);
        }
    }

    #[test]
    fn cut_is_lower_than_maintain() {
        let maintain = compute_targets(&reference_profile(), AS_OF).unwrap();
        let mut p = reference_profile();
        p.goal = "cut".into();
        let cut = compute_targets(&p, AS_OF).unwrap();
        assert_eq!(cut.daily.kcal, 2207);
        assert!(cut.daily.kcal < maintain.daily.kcal);
    }

    #[test]
    fn female_uses_lower_offset() {
        let mut p = reference_profile();
        p.sex = "female".into();
        let t = compute_targets(&p, AS_OF).unwrap();
        // (1780 - 166) * 1.55 = 2501.7
        assert_eq!(t.daily.kcal, 2502);
    }

    #[test]
    fn kcal_override_leaves_grams_alone() {
        let base = compute_targets(&reference_profile(), AS_OF).unwrap();
        let mut p = reference_profile();
        p.override_kcal = Some(2000);
        let t = compute_targets(&p, AS_OF).unwrap();
        assert_eq!(t.daily.kcal, 2000);
        assert_eq!(t.daily.protein_g, base.daily.protein_g);
        assert_eq!(t.daily.carbs_g, base.daily.carbs_g);
        assert_eq!(t.daily.fat_g, base.daily.fat_g);
        assert_eq!(t.weekly.kcal, 14_000);
    }

    #[test]
    fn kcal_override_mismatch_is_flagged() {
        let mut p = reference_profile();
        p.override_kcal = Some(2000);
        let t = compute_targets(&p, AS_OF).unwrap();
        // grams still imply 207*4 + 276*4 + 92*9 = 2760
        assert_eq!(
            t.warnings,
            vec![TargetWarning::MacroEnergyMismatch { delta_kcal: -760 }]
        );
        assert_eq!(t.warnings[0].to_string(), "macro_energy_mismatch;delta_kcal=-760");
    }

    #[test]
    fn low_kcal_warns_without_failing() {
        let mut p = reference_profile();
        p.override_kcal = Some(900);
        p.override_protein_g = Some(60);
        p.override_carbs_g = Some(100);
        p.override_fat_g = Some(27);
        let t = compute_targets(&p, AS_OF).unwrap();
        assert_eq!(t.warnings, vec![TargetWarning::BelowSafetyFloor { daily_kcal: 900 }]);
    }

    #[test]
    fn high_kcal_warns() {
        let mut p = reference_profile();
        p.weight_kg = 200.0;
        p.activity_level = "athlete".into();
        p.goal = "bulk".into();
        let t = compute_targets(&p, AS_OF).unwrap();
        assert!(t.daily.kcal > KCAL_PLAUSIBLE_CEILING);
        assert!(matches!(t.warnings[0], TargetWarning::AbovePlausibleCeiling { .. }));
    }

    #[test]
    fn invalid_profiles_are_rejected() {
        let mut p = reference_profile();
        p.height_cm = 0;
        let TargetsError::InvalidProfile(errors) = compute_targets(&p, AS_OF).unwrap_err();
        assert!(errors.has("height_cm"));

        let mut p = reference_profile();
        p.weight_kg = -5.0;
        let TargetsError::InvalidProfile(errors) = compute_targets(&p, AS_OF).unwrap_err();
        assert!(errors.has("weight_kg"));

        let mut p = reference_profile();
        p.birth_date = "13-45-2000".into();
        let TargetsError::InvalidProfile(errors) = compute_targets(&p, AS_OF).unwrap_err();
        assert!(errors.has("birth_date"));
    }

    #[test]
    fn every_bad_field_is_reported() {
        let p = ProfileInput {
            sex: "other".into(),
            birth_date: "2030-01-01".into(),
            height_cm: 400,
            weight_kg: f64::NAN,
            activity_level: "couch".into(),
            goal: "shred".into(),
            override_kcal: Some(-1),
            override_protein_g: None,
            override_carbs_g: None,
            override_fat_g: Some(5_000),
        };
        let errors = p.validate(AS_OF).unwrap_err();
        let codes: Vec<_> = errors.0.iter().map(|e| (&*e.field, e.code)).collect();
        assert!(codes.contains(&("sex", "invalid_choice")));
        assert!(codes.contains(&("birth_date", "in_future")));
        assert!(codes.contains(&("height_cm", "out_of_range")));
        assert!(codes.contains(&("weight_kg", "must_be_positive")));
        assert!(codes.contains(&("override_kcal", "must_be_non_negative")));
        assert!(codes.contains(&("override_fat_g", "out_of_range")));
        assert_eq!(codes.len(), 8);
    }

    #[test]
    fn warnings_serialize_as_strings() {
        let json = serde_json::to_value(TargetWarning::BelowSafetyFloor { daily_kcal: 1000 }).unwrap();
        assert_eq!(json, "kcal_below_safety_floor;daily_kcal=1000");
    }
}
