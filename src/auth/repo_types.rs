use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct TenantRow {
    pub id: Uuid,
    pub status: String,
    pub subscription_status: String,
    pub trial_starts_at: Option<OffsetDateTime>,
    pub trial_ends_at: Option<OffsetDateTime>,
}

/// User record; `password_hash` never leaves the auth module.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub email: String,
    pub email_verified_at: Option<OffsetDateTime>,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct VerificationTokenRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}
