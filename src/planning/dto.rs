use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::TemplateListRow;
use super::services::{DayKey, InstanceSlot, SlotDraft, TemplateSlot, WeekPlanInstance, WeekPlanTemplate};
use crate::dates::parse_iso_date;
use crate::error::FieldErrors;

const MAX_NAME_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct SlotIn {
    pub day_key: String,
    pub slot_key: String,
    #[serde(default)]
    pub dish_template_id: Option<String>,
    #[serde(default)]
    pub dish_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Field-level checks for a list of slots; key normalization happens in the composer.
fn parse_slots(errors: &mut FieldErrors, items: &[SlotIn]) -> Vec<SlotDraft> {
    let mut drafts = Vec::with_capacity(items.len());
    for item in items {
        let day = DayKey::parse(&item.day_key);
        if day.is_none() && !errors.has("items.day_key") {
            errors.push("items.day_key", "invalid_choice");
        }

        let dish_template_id = match item.dish_template_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    if !errors.has("items.dish_template_id") {
                        errors.push("items.dish_template_id", "invalid_uuid");
                    }
                    None
                }
            },
        };

        let dish_name = item
            .dish_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if dish_name.is_some_and(|n| n.chars().count() > MAX_NAME_LEN) && !errors.has("items.dish_name") {
            errors.push("items.dish_name", "too_long");
        }

        let notes = item.notes.as_deref().filter(|n| !n.trim().is_empty());
        if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) && !errors.has("items.notes") {
            errors.push("items.notes", "too_long");
        }

        if let Some(day) = day {
            drafts.push(SlotDraft {
                day,
                slot_key: item.slot_key.clone(),
                dish_template_id,
                dish_name: dish_name.map(str::to_string),
                notes: notes.map(str::to_string),
            });
        }
    }
    drafts
}

#[derive(Debug, Deserialize)]
pub struct WeekPlanTemplateIn {
    pub name: String,
    pub items: Vec<SlotIn>,
}

impl WeekPlanTemplateIn {
    /// Trimmed name plus raw slot drafts.
    pub fn validate(&self) -> Result<(String, Vec<SlotDraft>), FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = self.name.trim();
        if name.is_empty() {
            errors.push("name", "required");
        } else if name.chars().count() > MAX_NAME_LEN {
            errors.push("name", "too_long");
        }
        let drafts = parse_slots(&mut errors, &self.items);
        errors.into_result((name.to_string(), drafts))
    }
}

#[derive(Debug, Deserialize)]
pub struct WeekPlanInstanceUpdateIn {
    pub items: Vec<SlotIn>,
}

impl WeekPlanInstanceUpdateIn {
    pub fn validate(&self) -> Result<Vec<SlotDraft>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let drafts = parse_slots(&mut errors, &self.items);
        errors.into_result(drafts)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFromTemplateIn {
    pub template_id: String,
    pub client_ref: String,
    pub week_start_date: String,
}

impl CreateFromTemplateIn {
    pub fn validate(&self) -> Result<(Uuid, Date), FieldErrors> {
        let mut errors = FieldErrors::new();
        let template_id = Uuid::parse_str(self.template_id.trim());
        if template_id.is_err() {
            errors.push("template_id", "invalid_uuid");
        }
        let week_start_date = parse_iso_date(&self.week_start_date);
        if week_start_date.is_none() {
            errors.push("week_start_date", "invalid_date");
        }
        match (template_id, week_start_date) {
            (Ok(id), Some(date)) => Ok((id, date)),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientWeekQuery {
    pub client_ref: String,
    pub week_start_date: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotUpdateIn {
    pub dish_template_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    pub slot_key: String,
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TemplateSlotOut {
    pub id: Uuid,
    pub day_key: DayKey,
    pub slot_key: String,
    pub dish_template_id: Option<Uuid>,
    pub dish_template_name: Option<String>,
    pub notes: Option<String>,
    pub position: i32,
}

impl From<TemplateSlot> for TemplateSlotOut {
    fn from(s: TemplateSlot) -> Self {
        Self {
            id: s.id,
            day_key: s.day,
            slot_key: s.slot_key,
            dish_template_id: s.dish_template_id,
            dish_template_name: s.dish_template_name,
            notes: s.notes,
            position: s.position,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WeekPlanTemplateOut {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub items: Vec<TemplateSlotOut>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl WeekPlanTemplateOut {
    pub fn new(
        template: WeekPlanTemplate,
        created_at: OffsetDateTime,
        updated_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            id: template.id,
            tenant_id: template.tenant_id,
            name: template.name,
            items: template.items.into_iter().map(Into::into).collect(),
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WeekPlanTemplateListItemOut {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub item_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<TemplateListRow> for WeekPlanTemplateListItemOut {
    fn from(r: TemplateListRow) -> Self {
        Self {
            id: r.id,
            tenant_id: r.tenant_id,
            name: r.name,
            item_count: r.item_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstanceSlotOut {
    pub id: Uuid,
    pub source_template_item_id: Option<Uuid>,
    pub day_key: DayKey,
    pub slot_key: String,
    pub dish_template_id: Option<Uuid>,
    pub dish_name: Option<String>,
    pub notes: Option<String>,
    pub position: i32,
}

impl From<InstanceSlot> for InstanceSlotOut {
    fn from(s: InstanceSlot) -> Self {
        Self {
            id: s.id,
            source_template_item_id: s.source_template_item_id,
            day_key: s.day,
            slot_key: s.slot_key,
            dish_template_id: s.dish_template_id,
            dish_name: s.dish_name,
            notes: s.notes,
            position: s.position,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WeekPlanInstanceOut {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub template_id: Option<Uuid>,
    pub client_ref: String,
    #[serde(serialize_with = "crate::dates::iso_date")]
    pub week_start_date: Date,
    pub template_name_snapshot: Option<String>,
    pub items: Vec<InstanceSlotOut>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<WeekPlanInstance> for WeekPlanInstanceOut {
    fn from(i: WeekPlanInstance) -> Self {
        Self {
            id: i.id,
            tenant_id: i.tenant_id,
            template_id: i.template_id,
            client_ref: i.client_ref,
            week_start_date: i.week_start_date,
            template_name_snapshot: i.template_name_snapshot,
            items: i.items.into_iter().map(Into::into).collect(),
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(day: &str, key: &str) -> SlotIn {
        SlotIn {
            day_key: day.into(),
            slot_key: key.into(),
            dish_template_id: None,
            dish_name: None,
            notes: None,
        }
    }

    #[test]
    fn template_in_reports_bad_day_and_blank_name() {
        let input = WeekPlanTemplateIn {
            name: "  ".into(),
            items: vec![slot("monday", "lunch"), slot("tue", "dinner")],
        };
        let err = input.validate().unwrap_err();
        assert!(err.has("name"));
        assert!(err.has("items.day_key"));
    }

    #[test]
    fn blank_dish_id_means_empty_slot() {
        let mut s = slot("wed", "lunch");
        s.dish_template_id = Some("  ".into());
        s.notes = Some("   ".into());
        let input = WeekPlanInstanceUpdateIn { items: vec![s] };
        let drafts = input.validate().unwrap();
        assert_eq!(drafts[0].day, DayKey::Wed);
        assert!(drafts[0].dish_template_id.is_none());
        assert!(drafts[0].notes.is_none());
    }

    #[test]
    fn malformed_dish_id_is_rejected() {
        let mut s = slot("wed", "lunch");
        s.dish_template_id = Some("not-a-uuid".into());
        let err = WeekPlanInstanceUpdateIn { items: vec![s] }.validate().unwrap_err();
        assert!(err.has("items.dish_template_id"));
    }

    #[test]
    fn create_from_template_parses_ids_and_dates() {
        let id = Uuid::new_v4();
        let ok = CreateFromTemplateIn {
            template_id: id.to_string(),
            client_ref: "c-1".into(),
            week_start_date: "2024-06-10".into(),
        };
        assert_eq!(ok.validate().unwrap().0, id);

        let bad = CreateFromTemplateIn {
            template_id: "x".into(),
            client_ref: "c-1".into(),
            week_start_date: "10/06/2024".into(),
        };
        let err = bad.validate().unwrap_err();
        assert!(err.has("template_id"));
        assert!(err.has("week_start_date"));
    }

    #[test]
    fn day_key_serializes_lowercase() {
        let out = TemplateSlotOut {
            id: Uuid::nil(),
            day_key: DayKey::Sat,
            slot_key: "snack".into(),
            dish_template_id: None,
            dish_template_name: None,
            notes: None,
            position: 3,
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["day_key"], "sat");
    }
}
