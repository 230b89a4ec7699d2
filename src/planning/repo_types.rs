use anyhow::Context;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::services::{DayKey, InstanceSlot, TemplateSlot, WeekPlanInstance, WeekPlanTemplate};

#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TemplateListRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub item_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TemplateItemRow {
    pub id: Uuid,
    pub day_key: String,
    pub slot_key: String,
    pub dish_template_id: Option<Uuid>,
    pub dish_template_name: Option<String>,
    pub notes: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct InstanceRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub template_id: Option<Uuid>,
    pub client_ref: String,
    pub week_start_date: Date,
    pub template_name_snapshot: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InstanceItemRow {
    pub id: Uuid,
    pub source_template_item_id: Option<Uuid>,
    pub day_key: String,
    pub slot_key: String,
    pub dish_template_id: Option<Uuid>,
    pub dish_name: Option<String>,
    pub notes: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct SlotUsageRow {
    pub slot_key: String,
    pub dish_template_id: Uuid,
}

fn day_key(raw: &str) -> anyhow::Result<DayKey> {
    DayKey::parse(raw).with_context(|| format!("stored day_key {raw:?} is not a weekday"))
}

impl TemplateRow {
    pub fn into_domain(self, items: Vec<TemplateItemRow>) -> anyhow::Result<WeekPlanTemplate> {
        let items = items
            .into_iter()
            .map(|r| {
                Ok(TemplateSlot {
                    id: r.id,
                    day: day_key(&r.day_key)?,
                    slot_key: r.slot_key,
                    dish_template_id: r.dish_template_id,
                    dish_template_name: r.dish_template_name,
                    notes: r.notes,
                    position: r.position,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(WeekPlanTemplate {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            items,
        })
    }
}

impl InstanceRow {
    pub fn into_domain(self, items: Vec<InstanceItemRow>) -> anyhow::Result<WeekPlanInstance> {
        let items = items
            .into_iter()
            .map(|r| {
                Ok(InstanceSlot {
                    id: r.id,
                    source_template_item_id: r.source_template_item_id,
                    day: day_key(&r.day_key)?,
                    slot_key: r.slot_key,
                    dish_template_id: r.dish_template_id,
                    dish_name: r.dish_name,
                    notes: r.notes,
                    position: r.position,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(WeekPlanInstance {
            id: self.id,
            tenant_id: self.tenant_id,
            template_id: self.template_id,
            client_ref: self.client_ref,
            week_start_date: self.week_start_date,
            template_name_snapshot: self.template_name_snapshot,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
