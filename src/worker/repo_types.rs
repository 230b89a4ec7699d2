use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct WorkerClientRow {
    pub id: Uuid,
    pub full_name: String,
    pub plan_status: String,
    pub last_check_in_label: String,
}
