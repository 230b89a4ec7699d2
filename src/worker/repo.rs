use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::WorkerClientRow;

pub async fn list_clients(
    db: &PgPool,
    tenant_id: Uuid,
    name_pattern: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<WorkerClientRow>> {
    sqlx::query_as::<_, WorkerClientRow>(
        r#"
        SELECT id, full_name, plan_status, last_check_in_label
        FROM worker_clients
        WHERE tenant_id = $1 AND ($2::text IS NULL OR full_name ILIKE $2)
        ORDER BY full_name ASC
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
