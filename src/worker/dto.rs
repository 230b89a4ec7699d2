use serde::Serialize;
use uuid::Uuid;

use super::repo_types::WorkerClientRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    OnTrack,
    Attention,
}

impl PlanStatus {
    /// Anything other than `on_track` needs the worker's attention.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "on_track" => Self::OnTrack,
            _ => Self::Attention,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorkerClientOut {
    pub id: Uuid,
    pub full_name: String,
    pub plan_status: PlanStatus,
    pub last_check_in_label: String,
}

impl From<WorkerClientRow> for WorkerClientOut {
    fn from(r: WorkerClientRow) -> Self {
        Self {
            id: r.id,
            full_name: r.full_name,
            plan_status: PlanStatus::from_stored(&r.plan_status),
            last_check_in_label: r.last_check_in_label,
        }
    }
}
