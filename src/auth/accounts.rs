use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStanding {
    Active,
    Inactive,
}

/// Lookup behind `AuthUser`. Tokens outlive deactivation, so every request re-checks.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// `None` when the user is gone or belongs to another tenant.
    async fn standing(&self, tenant_id: Uuid, user_id: Uuid)
        -> anyhow::Result<Option<AccountStanding>>;
}

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn standing(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<AccountStanding>> {
        let user = repo::find_user(&self.db, user_id).await?;
        Ok(user
            .filter(|u| u.tenant_id == tenant_id)
            .map(|u| {
                if u.is_active {
                    AccountStanding::Active
                } else {
                    AccountStanding::Inactive
                }
            }))
    }
}
