use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::accounts::{AccountStanding, AccountStore};
use super::services::{AccessMode, AuthError, JwtKeys, UserRole};
use crate::error::AppError;

/// The caller's session, decoded from the bearer token and re-checked against the
/// user's current standing.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
    pub access_mode: AccessMode,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    Arc<dyn AccountStore>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("not_authenticated"))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::unauthorized("not_authenticated"))?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::unauthorized("invalid_token")
        })?;

        let accounts = <Arc<dyn AccountStore> as FromRef<S>>::from_ref(state);
        match accounts.standing(claims.tenant_id, claims.sub).await? {
            Some(AccountStanding::Active) => {}
            Some(AccountStanding::Inactive) => {
                warn!(user_id = %claims.sub, "token presented for inactive user");
                return Err(AuthError::UserInactive.into());
            }
            None => {
                warn!(user_id = %claims.sub, "token presented for unknown user");
                return Err(AuthError::UserNotFound.into());
            }
        }

        Ok(AuthUser {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            role: claims.role,
            access_mode: claims.access_mode,
        })
    }
}

/// An `AuthUser` whose token still allows writes.
#[derive(Debug, Clone)]
pub struct WriteAccess(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for WriteAccess
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    Arc<dyn AccountStore>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.access_mode == AccessMode::ReadOnly {
            warn!(user_id = %user.user_id, "write rejected for read-only session");
            return Err(AppError::forbidden("read_only"));
        }
        Ok(WriteAccess(user))
    }
}
