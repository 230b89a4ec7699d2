use sqlx::{PgPool, Postgres, Transaction};
use time::Date;
use uuid::Uuid;

use super::repo_types::{
    InstanceItemRow, InstanceRow, SlotUsageRow, TemplateItemRow, TemplateListRow, TemplateRow,
};
use super::services::{InstanceSlot, SlotDraft, WeekPlanInstance};

const INSTANCE_COLUMNS: &str = "id, tenant_id, template_id, client_ref, week_start_date, \
     template_name_snapshot, created_at, updated_at";
const INSTANCE_ITEM_COLUMNS: &str = "id, source_template_item_id, day_key, slot_key, \
     dish_template_id, dish_name, notes, position";

pub async fn list_templates(
    db: &PgPool,
    tenant_id: Uuid,
    name_pattern: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<TemplateListRow>> {
    sqlx::query_as::<_, TemplateListRow>(
        r#"
        SELECT t.id, t.tenant_id, t.name, COUNT(i.id) AS item_count, t.created_at, t.updated_at
        FROM week_plan_templates t
        LEFT JOIN week_plan_template_items i ON i.week_plan_template_id = t.id
        WHERE t.tenant_id = $1 AND ($2::text IS NULL OR t.name ILIKE $2)
        GROUP BY t.id
        ORDER BY t.name ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(tenant_id)
    .bind(name_pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn get_template(
    db: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<(TemplateRow, Vec<TemplateItemRow>)>> {
    let Some(template) = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, tenant_id, name, created_at, updated_at
        FROM week_plan_templates
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(db)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, TemplateItemRow>(
        r#"
        SELECT id, day_key, slot_key, dish_template_id, dish_template_name, notes, position
        FROM week_plan_template_items
        WHERE tenant_id = $1 AND week_plan_template_id = $2
        ORDER BY position ASC, created_at ASC
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_all(db)
    .await?;

    Ok(Some((template, items)))
}

/// `slots` must already be normalized; their order becomes `position`.
pub async fn insert_template(
    db: &PgPool,
    tenant_id: Uuid,
    name: &str,
    slots: &[SlotDraft],
) -> sqlx::Result<Uuid> {
    let id = Uuid::new_v4();
    let mut tx = db.begin().await?;
    sqlx::query("INSERT INTO week_plan_templates (id, tenant_id, name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(tenant_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;
    insert_template_items(&mut tx, tenant_id, id, slots).await?;
    tx.commit().await?;
    Ok(id)
}

pub async fn replace_template(
    db: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
    name: &str,
    slots: &[SlotDraft],
) -> sqlx::Result<bool> {
    let mut tx = db.begin().await?;
    let res = sqlx::query(
        "UPDATE week_plan_templates SET name = $3, updated_at = now() WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant_id)
    .bind(id)
    .bind(name)
    .execute(&mut *tx)
    .await?;
    if res.rows_affected() == 0 {
        return Ok(false);
    }
    sqlx::query(
        "DELETE FROM week_plan_template_items WHERE tenant_id = $1 AND week_plan_template_id = $2",
    )
    .bind(tenant_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;
    insert_template_items(&mut tx, tenant_id, id, slots).await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn delete_template(db: &PgPool, tenant_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM week_plan_templates WHERE tenant_id = $1 AND id = $2")
        .bind(tenant_id)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

async fn insert_template_items(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    template_id: Uuid,
    slots: &[SlotDraft],
) -> sqlx::Result<()> {
    for (position, slot) in slots.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO week_plan_template_items
                (id, tenant_id, week_plan_template_id, day_key, slot_key,
                 dish_template_id, dish_template_name, notes, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(template_id)
        .bind(slot.day.as_str())
        .bind(&slot.slot_key)
        .bind(slot.dish_template_id)
        .bind(&slot.dish_name)
        .bind(&slot.notes)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn instance_exists(
    db: &PgPool,
    tenant_id: Uuid,
    client_ref: &str,
    week_start_date: Date,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM week_plan_instances
            WHERE tenant_id = $1 AND client_ref = $2 AND week_start_date = $3
        )
        "#,
    )
    .bind(tenant_id)
    .bind(client_ref)
    .bind(week_start_date)
    .fetch_one(db)
    .await
}

/// Writes a freshly composed instance and all of its slots. A concurrent create
/// for the same client week fails on `uq_week_plan_instances_tenant_client_week`.
pub async fn insert_instance(db: &PgPool, instance: &WeekPlanInstance) -> sqlx::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO week_plan_instances
            (id, tenant_id, template_id, client_ref, week_start_date, template_name_snapshot, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(instance.id)
    .bind(instance.tenant_id)
    .bind(instance.template_id)
    .bind(&instance.client_ref)
    .bind(instance.week_start_date)
    .bind(&instance.template_name_snapshot)
    .bind(instance.created_at)
    .execute(&mut *tx)
    .await?;

    for slot in &instance.items {
        sqlx::query(
            r#"
            INSERT INTO week_plan_instance_items
                (id, tenant_id, week_plan_instance_id, source_template_item_id, day_key, slot_key,
                 dish_template_id, dish_name, notes, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(slot.id)
        .bind(instance.tenant_id)
        .bind(instance.id)
        .bind(slot.source_template_item_id)
        .bind(slot.day.as_str())
        .bind(&slot.slot_key)
        .bind(slot.dish_template_id)
        .bind(&slot.dish_name)
        .bind(&slot.notes)
        .bind(slot.position)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

pub async fn get_instance(
    db: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<(InstanceRow, Vec<InstanceItemRow>)>> {
    let row = sqlx::query_as::<_, InstanceRow>(&format!(
        "SELECT {INSTANCE_COLUMNS} FROM week_plan_instances WHERE tenant_id = $1 AND id = $2"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(db)
    .await?;
    with_instance_items(db, row).await
}

pub async fn find_instance_by_client_week(
    db: &PgPool,
    tenant_id: Uuid,
    client_ref: &str,
    week_start_date: Date,
) -> sqlx::Result<Option<(InstanceRow, Vec<InstanceItemRow>)>> {
    let row = sqlx::query_as::<_, InstanceRow>(&format!(
        r#"
        SELECT {INSTANCE_COLUMNS}
        FROM week_plan_instances
        WHERE tenant_id = $1 AND client_ref = $2 AND week_start_date = $3
        "#
    ))
    .bind(tenant_id)
    .bind(client_ref)
    .bind(week_start_date)
    .fetch_optional(db)
    .await?;
    with_instance_items(db, row).await
}

async fn with_instance_items(
    db: &PgPool,
    row: Option<InstanceRow>,
) -> sqlx::Result<Option<(InstanceRow, Vec<InstanceItemRow>)>> {
    let Some(instance) = row else {
        return Ok(None);
    };
    let items = sqlx::query_as::<_, InstanceItemRow>(&format!(
        r#"
        SELECT {INSTANCE_ITEM_COLUMNS}
        FROM week_plan_instance_items
        WHERE tenant_id = $1 AND week_plan_instance_id = $2
        ORDER BY position ASC, created_at ASC
        "#
    ))
    .bind(instance.tenant_id)
    .bind(instance.id)
    .fetch_all(db)
    .await?;
    Ok(Some((instance, items)))
}

/// Full-plan replace. Replaced slots lose their template lineage.
pub async fn replace_instance_items(
    db: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
    slots: &[SlotDraft],
) -> sqlx::Result<bool> {
    let mut tx = db.begin().await?;
    let res = sqlx::query(
        "UPDATE week_plan_instances SET updated_at = now() WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;
    if res.rows_affected() == 0 {
        return Ok(false);
    }
    sqlx::query(
        "DELETE FROM week_plan_instance_items WHERE tenant_id = $1 AND week_plan_instance_id = $2",
    )
    .bind(tenant_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    for (position, slot) in slots.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO week_plan_instance_items
                (id, tenant_id, week_plan_instance_id, day_key, slot_key,
                 dish_template_id, dish_name, notes, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(id)
        .bind(slot.day.as_str())
        .bind(&slot.slot_key)
        .bind(slot.dish_template_id)
        .bind(&slot.dish_name)
        .bind(&slot.notes)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(true)
}

/// Persists one substituted slot; sibling rows and the instance row are not
/// written. Returns the number of slot rows touched.
pub async fn update_instance_slot(
    db: &PgPool,
    tenant_id: Uuid,
    instance_id: Uuid,
    slot: &InstanceSlot,
) -> sqlx::Result<u64> {
    let res = sqlx::query(
        r#"
        UPDATE week_plan_instance_items
        SET dish_template_id = $4, dish_name = $5, updated_at = now()
        WHERE tenant_id = $1 AND week_plan_instance_id = $2 AND id = $3
        "#,
    )
    .bind(tenant_id)
    .bind(instance_id)
    .bind(slot.id)
    .bind(slot.dish_template_id)
    .bind(&slot.dish_name)
    .execute(db)
    .await?;
    Ok(res.rows_affected())
}

/// Every dish ever placed in a tenant plan, with the slot it went into.
pub async fn slot_history(db: &PgPool, tenant_id: Uuid) -> sqlx::Result<Vec<SlotUsageRow>> {
    sqlx::query_as::<_, SlotUsageRow>(
        r#"
        SELECT slot_key, dish_template_id
        FROM week_plan_template_items
        WHERE tenant_id = $1 AND dish_template_id IS NOT NULL
        UNION
        SELECT slot_key, dish_template_id
        FROM week_plan_instance_items
        WHERE tenant_id = $1 AND dish_template_id IS NOT NULL
        "#,
    )
    .bind(tenant_id)
    .fetch_all(db)
    .await
}
