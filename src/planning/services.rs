//! Week-plan composition: materializing a template for a client week, swapping
//! single slots, normalizing full-plan edits, and ranking dish suggestions.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{AppError, FieldErrors};

pub const MAX_SLOT_KEY_LEN: usize = 50;
pub const MAX_CLIENT_REF_LEN: usize = 64;
pub const DEFAULT_SUGGESTION_LIMIT: usize = 20;
pub const MAX_SUGGESTION_LIMIT: usize = 100;

/// Day of the plan week; ordering is Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayKey {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "mon" => Some(DayKey::Mon),
            "tue" => Some(DayKey::Tue),
            "wed" => Some(DayKey::Wed),
            "thu" => Some(DayKey::Thu),
            "fri" => Some(DayKey::Fri),
            "sat" => Some(DayKey::Sat),
            "sun" => Some(DayKey::Sun),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayKey::Mon => "mon",
            DayKey::Tue => "tue",
            DayKey::Wed => "wed",
            DayKey::Thu => "thu",
            DayKey::Fri => "fri",
            DayKey::Sat => "sat",
            DayKey::Sun => "sun",
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("client_ref must be 1 to 64 characters")]
    InvalidClientRef,
    #[error("a plan already exists for this client and week")]
    DuplicateInstance,
    #[error("no slot {slot_key:?} on {day}")]
    SlotNotFound { day: DayKey, slot_key: String },
    #[error("plan has no slots")]
    EmptyPlan,
    #[error("slot_key must be 1 to 50 characters")]
    InvalidSlotKey,
    #[error("slot {slot_key:?} appears twice on {day}")]
    DuplicateDaySlot { day: DayKey, slot_key: String },
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::InvalidClientRef => AppError::bad_request("invalid_client_ref"),
            PlanError::DuplicateInstance => AppError::conflict("week_plan_instance_exists"),
            PlanError::SlotNotFound { .. } => AppError::not_found("week_plan_slot_not_found"),
            PlanError::EmptyPlan => {
                let mut errors = FieldErrors::new();
                errors.push("items", "required");
                AppError::Validation(errors)
            }
            PlanError::InvalidSlotKey => AppError::bad_request("invalid_slot_key"),
            PlanError::DuplicateDaySlot { .. } => AppError::bad_request("duplicate_day_slot"),
        }
    }
}

/// One slot of a full-plan edit, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDraft {
    pub day: DayKey,
    pub slot_key: String,
    pub dish_template_id: Option<Uuid>,
    pub dish_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSlot {
    pub id: Uuid,
    pub day: DayKey,
    pub slot_key: String,
    pub dish_template_id: Option<Uuid>,
    pub dish_template_name: Option<String>,
    pub notes: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekPlanTemplate {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub items: Vec<TemplateSlot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSlot {
    pub id: Uuid,
    pub source_template_item_id: Option<Uuid>,
    pub day: DayKey,
    pub slot_key: String,
    pub dish_template_id: Option<Uuid>,
    pub dish_name: Option<String>,
    pub notes: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekPlanInstance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub template_id: Option<Uuid>,
    pub client_ref: String,
    pub week_start_date: Date,
    pub template_name_snapshot: Option<String>,
    pub items: Vec<InstanceSlot>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl WeekPlanInstance {
    pub fn slot(&self, day: DayKey, slot_key: &str) -> Option<&InstanceSlot> {
        self.items
            .iter()
            .find(|s| s.day == day && s.slot_key == slot_key)
    }
}

/// Dish placed into a slot; the name is a snapshot taken at placement time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DishRef {
    pub dish_template_id: Uuid,
    pub dish_name: String,
}

pub fn normalize_client_ref(raw: &str) -> Result<String, PlanError> {
    let client_ref = raw.trim();
    let len = client_ref.chars().count();
    if len == 0 || len > MAX_CLIENT_REF_LEN {
        return Err(PlanError::InvalidClientRef);
    }
    Ok(client_ref.to_string())
}

/// Deep copy of every template slot into a fresh instance. Later edits to the
/// template never reach the copy.
pub fn create_instance_from_template(
    template: &WeekPlanTemplate,
    client_ref: &str,
    week_start_date: Date,
    now: OffsetDateTime,
) -> Result<WeekPlanInstance, PlanError> {
    let client_ref = normalize_client_ref(client_ref)?;
    let items = template
        .items
        .iter()
        .map(|slot| InstanceSlot {
            id: Uuid::new_v4(),
            source_template_item_id: Some(slot.id),
            day: slot.day,
            slot_key: slot.slot_key.clone(),
            dish_template_id: slot.dish_template_id,
            dish_name: slot.dish_template_name.clone(),
            notes: slot.notes.clone(),
            position: slot.position,
        })
        .collect();

    Ok(WeekPlanInstance {
        id: Uuid::new_v4(),
        tenant_id: template.tenant_id,
        template_id: Some(template.id),
        client_ref,
        week_start_date,
        template_name_snapshot: Some(template.name.clone()),
        items,
        created_at: now,
        updated_at: None,
    })
}

/// Points exactly one slot at a new dish. Notes, position and every sibling slot stay as they were.
pub fn update_slot(
    mut instance: WeekPlanInstance,
    day: DayKey,
    slot_key: &str,
    dish: DishRef,
) -> Result<WeekPlanInstance, PlanError> {
    let slot_key = slot_key.trim();
    let slot = instance
        .items
        .iter_mut()
        .find(|s| s.day == day && s.slot_key == slot_key)
        .ok_or_else(|| PlanError::SlotNotFound {
            day,
            slot_key: slot_key.to_string(),
        })?;
    slot.dish_template_id = Some(dish.dish_template_id);
    slot.dish_name = Some(dish.dish_name);
    Ok(instance)
}

/// A slot write must touch exactly one row; anything else means the slot
/// was removed (or duplicated) underneath the substitution.
pub fn confirm_slot_write(
    rows_affected: u64,
    day: DayKey,
    slot_key: &str,
) -> Result<(), PlanError> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(PlanError::SlotNotFound {
            day,
            slot_key: slot_key.to_string(),
        })
    }
}

pub fn normalize_slot_key(raw: &str) -> Result<String, PlanError> {
    let key = raw.trim();
    let len = key.chars().count();
    if len == 0 || len > MAX_SLOT_KEY_LEN {
        return Err(PlanError::InvalidSlotKey);
    }
    Ok(key.to_string())
}

/// Trims slot keys, rejects duplicates and orders by (day, slot_key).
/// The returned order is the stored position.
pub fn normalize_slots(drafts: Vec<SlotDraft>) -> Result<Vec<SlotDraft>, PlanError> {
    if drafts.is_empty() {
        return Err(PlanError::EmptyPlan);
    }

    let mut seen = HashSet::with_capacity(drafts.len());
    let mut slots = Vec::with_capacity(drafts.len());
    for mut draft in drafts {
        draft.slot_key = normalize_slot_key(&draft.slot_key)?;
        if !seen.insert((draft.day, draft.slot_key.clone())) {
            return Err(PlanError::DuplicateDaySlot {
                day: draft.day,
                slot_key: draft.slot_key,
            });
        }
        slots.push(draft);
    }

    slots.sort_by(|a, b| (a.day, &a.slot_key).cmp(&(b.day, &b.slot_key)));
    Ok(slots)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    const ALL: [MealType; 4] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner, MealType::Snack];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            MealType::Breakfast => &["breakfast", "desayuno"],
            MealType::Lunch => &["lunch", "almuerzo", "comida"],
            MealType::Dinner => &["dinner", "cena"],
            MealType::Snack => &["snack", "merienda"],
        }
    }

    fn mentioned_in(self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        self.keywords().iter().any(|k| text.contains(k))
    }

    /// First meal type whose keyword appears in the slot key.
    pub fn from_slot_key(slot_key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.mentioned_in(slot_key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DishCandidate {
    pub id: Uuid,
    pub name: String,
}

/// A past placement of a dish in some slot, template or instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotUsage {
    pub slot_key: String,
    pub dish_template_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DishSuggestion {
    pub id: Uuid,
    pub name: String,
    pub meal_type: Option<MealType>,
    pub score: u8,
}

/// Ranks dishes for a slot. +2 when the dish was used before in a slot of the
/// same meal type, +1 when its name mentions that meal type. If anything scores,
/// unscored dishes are dropped. Ties break on the lower-cased name.
pub fn suggest_dishes(
    slot_key: &str,
    query: Option<&str>,
    candidates: &[DishCandidate],
    history: &[SlotUsage],
    limit: usize,
) -> Result<Vec<DishSuggestion>, PlanError> {
    let slot_key = normalize_slot_key(slot_key)?;
    let meal_type = MealType::from_slot_key(&slot_key);
    let limit = limit.clamp(1, MAX_SUGGESTION_LIMIT);

    let historical: HashSet<Uuid> = match meal_type {
        Some(m) => history
            .iter()
            .filter(|u| MealType::from_slot_key(&u.slot_key) == Some(m))
            .map(|u| u.dish_template_id)
            .collect(),
        None => HashSet::new(),
    };

    let needle = query
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let mut scored: Vec<DishSuggestion> = candidates
        .iter()
        .filter(|c| match &needle {
            Some(n) => c.name.to_lowercase().contains(n.as_str()),
            None => true,
        })
        .map(|c| {
            let mut score = 0;
            if let Some(m) = meal_type {
                if historical.contains(&c.id) {
                    score += 2;
                }
                if m.mentioned_in(&c.name) {
                    score += 1;
                }
            }
            DishSuggestion {
                id: c.id,
                name: c.name.clone(),
                meal_type,
                score,
            }
        })
        .collect();

    if scored.iter().any(|s| s.score > 0) {
        scored.retain(|s| s.score > 0);
    }
    scored.sort_by_cached_key(|s| (Reverse(s.score), s.name.to_lowercase()));
    scored.truncate(limit);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn template() -> WeekPlanTemplate {
        let dish = Uuid::new_v4();
        WeekPlanTemplate {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Base week".into(),
            items: vec![
                TemplateSlot {
                    id: Uuid::new_v4(),
                    day: DayKey::Mon,
                    slot_key: "breakfast".into(),
                    dish_template_id: Some(dish),
                    dish_template_name: Some("Oats".into()),
                    notes: Some("no sugar".into()),
                    position: 0,
                },
                TemplateSlot {
                    id: Uuid::new_v4(),
                    day: DayKey::Mon,
                    slot_key: "lunch".into(),
                    dish_template_id: None,
                    dish_template_name: None,
                    notes: None,
                    position: 1,
                },
                TemplateSlot {
                    id: Uuid::new_v4(),
                    day: DayKey::Tue,
                    slot_key: "dinner".into(),
                    dish_template_id: Some(dish),
                    dish_template_name: Some("Oats".into()),
                    notes: None,
                    position: 2,
                },
            ],
        }
    }

    fn instance() -> WeekPlanInstance {
        create_instance_from_template(
            &template(),
            "client-7",
            date!(2024 - 06 - 10),
            datetime!(2024-06-01 08:00 UTC),
        )
        .unwrap()
    }

    fn draft(day: DayKey, slot_key: &str) -> SlotDraft {
        SlotDraft {
            day,
            slot_key: slot_key.into(),
            dish_template_id: None,
            dish_name: None,
            notes: None,
        }
    }

    fn candidate(name: &str) -> DishCandidate {
        DishCandidate { id: Uuid::new_v4(), name: name.into() }
    }

    #[test]
    fn instance_copies_every_slot() {
        let t = template();
        let i = create_instance_from_template(
            &t,
            "  client-7 ",
            date!(2024 - 06 - 10),
            datetime!(2024-06-01 08:00 UTC),
        )
        .unwrap();

        assert_eq!(i.client_ref, "client-7");
        assert_eq!(i.template_id, Some(t.id));
        assert_eq!(i.tenant_id, t.tenant_id);
        assert_eq!(i.template_name_snapshot.as_deref(), Some("Base week"));
        assert_eq!(i.items.len(), t.items.len());
        for (slot, source) in i.items.iter().zip(&t.items) {
            assert_eq!(slot.source_template_item_id, Some(source.id));
            assert_ne!(slot.id, source.id);
            assert_eq!(slot.day, source.day);
            assert_eq!(slot.slot_key, source.slot_key);
            assert_eq!(slot.dish_template_id, source.dish_template_id);
            assert_eq!(slot.dish_name, source.dish_template_name);
            assert_eq!(slot.notes, source.notes);
            assert_eq!(slot.position, source.position);
        }
    }

    #[test]
    fn later_template_edits_do_not_reach_the_instance() {
        let mut t = template();
        let i = create_instance_from_template(
            &t,
            "c",
            date!(2024 - 06 - 10),
            datetime!(2024-06-01 08:00 UTC),
        )
        .unwrap();
        t.items[0].dish_template_name = Some("Pancakes".into());
        t.name = "Renamed".into();
        assert_eq!(i.items[0].dish_name.as_deref(), Some("Oats"));
        assert_eq!(i.template_name_snapshot.as_deref(), Some("Base week"));
    }

    #[test]
    fn client_ref_bounds() {
        let t = template();
        let week = date!(2024 - 06 - 10);
        let now = datetime!(2024-06-01 08:00 UTC);
        assert_eq!(
            create_instance_from_template(&t, "   ", week, now),
            Err(PlanError::InvalidClientRef)
        );
        let long = "x".repeat(MAX_CLIENT_REF_LEN + 1);
        assert_eq!(
            create_instance_from_template(&t, &long, week, now),
            Err(PlanError::InvalidClientRef)
        );
        let exact = "x".repeat(MAX_CLIENT_REF_LEN);
        assert!(create_instance_from_template(&t, &exact, week, now).is_ok());
    }

    #[test]
    fn update_slot_touches_one_slot_only() {
        let before = instance();
        let dish = DishRef { dish_template_id: Uuid::new_v4(), dish_name: "Salmon bowl".into() };
        let after = update_slot(before.clone(), DayKey::Mon, "lunch", dish.clone()).unwrap();

        let changed = after.slot(DayKey::Mon, "lunch").unwrap();
        assert_eq!(changed.dish_template_id, Some(dish.dish_template_id));
        assert_eq!(changed.dish_name.as_deref(), Some("Salmon bowl"));
        assert_eq!(changed.id, before.items[1].id);
        assert_eq!(changed.notes, before.items[1].notes);

        assert_eq!(after.items[0], before.items[0]);
        assert_eq!(after.items[2], before.items[2]);
        assert_eq!(after.client_ref, before.client_ref);
        assert_eq!(after.week_start_date, before.week_start_date);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn update_slot_reports_missing_slot() {
        let dish = DishRef { dish_template_id: Uuid::new_v4(), dish_name: "X".into() };
        let err = update_slot(instance(), DayKey::Sun, "lunch", dish).unwrap_err();
        assert_eq!(
            err,
            PlanError::SlotNotFound { day: DayKey::Sun, slot_key: "lunch".into() }
        );
    }

    #[test]
    fn slot_write_must_touch_exactly_one_row() {
        assert_eq!(confirm_slot_write(1, DayKey::Tue, "dinner"), Ok(()));
        for rows in [0, 2] {
            let err = confirm_slot_write(rows, DayKey::Tue, "dinner").unwrap_err();
            assert_eq!(
                err,
                PlanError::SlotNotFound { day: DayKey::Tue, slot_key: "dinner".into() }
            );
            let app: AppError = err.into();
            assert!(matches!(app, AppError::NotFound(ref code) if code == "week_plan_slot_not_found"));
        }
    }

    #[test]
    fn normalize_sorts_monday_first_then_slot_key() {
        let slots = normalize_slots(vec![
            draft(DayKey::Sun, "lunch"),
            draft(DayKey::Mon, " lunch "),
            draft(DayKey::Mon, "breakfast"),
            draft(DayKey::Wed, "dinner"),
        ])
        .unwrap();
        let keys: Vec<_> = slots.iter().map(|s| (s.day, s.slot_key.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (DayKey::Mon, "breakfast"),
                (DayKey::Mon, "lunch"),
                (DayKey::Wed, "dinner"),
                (DayKey::Sun, "lunch"),
            ]
        );
    }

    #[test]
    fn normalize_rejects_bad_plans() {
        assert_eq!(normalize_slots(vec![]), Err(PlanError::EmptyPlan));
        assert_eq!(
            normalize_slots(vec![draft(DayKey::Mon, "  ")]),
            Err(PlanError::InvalidSlotKey)
        );
        assert_eq!(
            normalize_slots(vec![draft(DayKey::Mon, &"s".repeat(51))]),
            Err(PlanError::InvalidSlotKey)
        );
        assert_eq!(
            normalize_slots(vec![draft(DayKey::Tue, "lunch"), draft(DayKey::Tue, "lunch ")]),
            Err(PlanError::DuplicateDaySlot { day: DayKey::Tue, slot_key: "lunch".into() })
        );
        assert!(normalize_slots(vec![draft(DayKey::Tue, "lunch"), draft(DayKey::Wed, "lunch")]).is_ok());
    }

    #[test]
    fn meal_type_from_slot_keywords() {
        assert_eq!(MealType::from_slot_key("Desayuno"), Some(MealType::Breakfast));
        assert_eq!(MealType::from_slot_key("late lunch"), Some(MealType::Lunch));
        assert_eq!(MealType::from_slot_key("comida"), Some(MealType::Lunch));
        assert_eq!(MealType::from_slot_key("CENA"), Some(MealType::Dinner));
        assert_eq!(MealType::from_slot_key("merienda"), Some(MealType::Snack));
        assert_eq!(MealType::from_slot_key("pre-workout"), None);
    }

    #[test]
    fn suggestions_rank_history_over_name() {
        let eggs = candidate("Eggs");
        let bowl = candidate("Breakfast bowl");
        let history_hit = candidate("Yogurt");
        let plain = candidate("Apple pie");
        let candidates = vec![eggs.clone(), bowl.clone(), history_hit.clone(), plain.clone()];
        let history = vec![
            SlotUsage { slot_key: "desayuno".into(), dish_template_id: history_hit.id },
            SlotUsage { slot_key: "dinner".into(), dish_template_id: eggs.id },
        ];

        let out = suggest_dishes("breakfast", None, &candidates, &history, 20).unwrap();
        let names: Vec<_> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Yogurt", "Breakfast bowl"]);
        assert_eq!(out[0].score, 2);
        assert_eq!(out[1].score, 1);
        assert_eq!(out[0].meal_type, Some(MealType::Breakfast));
    }

    #[test]
    fn suggestions_fall_back_to_all_sorted_by_name() {
        let candidates = vec![candidate("banana"), candidate("Apple"), candidate("cherry")];
        let out = suggest_dishes("pre-workout", None, &candidates, &[], 20).unwrap();
        let names: Vec<_> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "banana", "cherry"]);
        assert!(out.iter().all(|s| s.score == 0 && s.meal_type.is_none()));
    }

    #[test]
    fn suggestions_filter_by_query_and_limit() {
        let candidates = vec![
            candidate("Chicken salad"),
            candidate("Chicken curry"),
            candidate("Tofu salad"),
        ];
        let out = suggest_dishes("lunch", Some(" CHICKEN "), &candidates, &[], 1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Chicken curry");

        assert_eq!(
            suggest_dishes("  ", None, &candidates, &[], 5),
            Err(PlanError::InvalidSlotKey)
        );
    }

    #[test]
    fn plan_errors_map_to_http_codes() {
        assert!(matches!(
            AppError::from(PlanError::DuplicateInstance),
            AppError::Conflict(ref d) if d == "week_plan_instance_exists"
        ));
        assert!(matches!(AppError::from(PlanError::EmptyPlan), AppError::Validation(_)));
    }
}
