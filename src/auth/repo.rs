use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{TenantRow, UserRow, VerificationTokenRow};

const USER_COLUMNS: &str =
    "id, tenant_id, role, email, email_verified_at, password_hash, is_active, created_at";

/// Workers win when the same email exists under both roles.
pub async fn find_user_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE lower(email) = lower($1)
        ORDER BY (role = 'worker') DESC, created_at ASC
        LIMIT 1
        "#
    ))
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn find_user(db: &PgPool, id: Uuid) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn worker_email_taken(db: &PgPool, email: &str) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1) AND role = 'worker')",
    )
    .bind(email)
    .fetch_one(db)
    .await
}

pub async fn get_tenant(db: &PgPool, id: Uuid) -> sqlx::Result<Option<TenantRow>> {
    sqlx::query_as::<_, TenantRow>(
        r#"
        SELECT id, status, subscription_status, trial_starts_at, trial_ends_at
        FROM tenants
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Creates tenant, worker and pending verification token in one transaction.
/// Returns the new user id.
pub async fn register_worker(
    db: &PgPool,
    email: &str,
    password_hash: &str,
    token_hash: &str,
    token_expires_at: OffsetDateTime,
) -> sqlx::Result<Uuid> {
    let tenant_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let mut tx = db.begin().await?;

    sqlx::query(
        "INSERT INTO tenants (id, status, subscription_status) VALUES ($1, 'active', 'trial')",
    )
    .bind(tenant_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, tenant_id, role, email, password_hash, is_active)
        VALUES ($1, $2, 'worker', $3, $4, TRUE)
        "#,
    )
    .bind(user_id)
    .bind(tenant_id)
    .bind(email)
    .bind(password_hash)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO email_verification_tokens (id, tenant_id, user_id, token_hash, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(user_id)
    .bind(token_hash)
    .bind(token_expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(user_id)
}

pub async fn find_unconsumed_token(
    db: &PgPool,
    token_hash: &str,
) -> sqlx::Result<Option<VerificationTokenRow>> {
    sqlx::query_as::<_, VerificationTokenRow>(
        r#"
        SELECT id, tenant_id, user_id, expires_at
        FROM email_verification_tokens
        WHERE token_hash = $1 AND consumed_at IS NULL
        "#,
    )
    .bind(token_hash)
    .fetch_optional(db)
    .await
}

/// Marks the user verified, starts the tenant trial if it never started,
/// and consumes the token.
pub async fn consume_verification(
    db: &PgPool,
    token: &VerificationTokenRow,
    now: OffsetDateTime,
    trial_ends_at: OffsetDateTime,
) -> sqlx::Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        UPDATE users
        SET email_verified_at = COALESCE(email_verified_at, $2), updated_at = $2
        WHERE id = $1
        "#,
    )
    .bind(token.user_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE tenants
        SET trial_starts_at = $2, trial_ends_at = $3, subscription_status = 'trial', updated_at = $2
        WHERE id = $1 AND trial_starts_at IS NULL
        "#,
    )
    .bind(token.tenant_id)
    .bind(now)
    .bind(trial_ends_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE email_verification_tokens SET consumed_at = $2 WHERE id = $1")
        .bind(token.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}
