use std::fmt;
use std::time::Duration;

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRef;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

use super::repo_types::TenantRow;
use crate::config::JwtConfig;
use crate::error::AppError;
use crate::state::AppState;

pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 48;
pub const TRIAL_DAYS: i64 = 30;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Worker,
    Client,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Worker => "worker",
            UserRole::Client => "client",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "worker" => Some(UserRole::Worker),
            "client" => Some(UserRole::Client),
            _ => None,
        }
    }
}

/// What a token lets its holder do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Active,
    ReadOnly,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Active => "active",
            AccessMode::ReadOnly => "read_only",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant standing derived from status, subscription and trial window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantAccess {
    Active,
    Trial,
    Expired,
    Blocked,
}

pub fn tenant_access_mode(tenant: &TenantRow, now: OffsetDateTime) -> TenantAccess {
    if tenant.status != "active" {
        return TenantAccess::Blocked;
    }
    if tenant.subscription_status == "active" {
        return TenantAccess::Active;
    }
    match tenant.trial_ends_at {
        Some(ends) if now >= ends => TenantAccess::Expired,
        _ => TenantAccess::Trial,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user is inactive")]
    UserInactive,
    #[error("user no longer exists")]
    UserNotFound,
    #[error("email not verified")]
    EmailNotVerified,
    #[error("tenant is blocked")]
    TenantBlocked,
    #[error("tenant is inactive")]
    TenantInactive,
    #[error("email already registered")]
    EmailInUse,
    #[error("verification token is invalid")]
    InvalidToken,
    #[error("verification token expired")]
    TokenExpired,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::unauthorized("invalid_credentials"),
            AuthError::UserInactive => AppError::forbidden("user_inactive"),
            AuthError::UserNotFound => AppError::unauthorized("user_not_found"),
            AuthError::EmailNotVerified => AppError::forbidden("email_not_verified"),
            AuthError::TenantBlocked => AppError::forbidden("tenant_blocked"),
            AuthError::TenantInactive => AppError::forbidden("tenant_inactive"),
            AuthError::EmailInUse => AppError::conflict("email_in_use"),
            AuthError::InvalidToken => AppError::bad_request("invalid_token"),
            AuthError::TokenExpired => AppError::bad_request("token_expired"),
        }
    }
}

/// Access mode granted at login. Workers on an expired trial keep read access;
/// clients of a lapsed tenant are locked out entirely.
pub fn login_access_mode(
    role: UserRole,
    email_verified: bool,
    tenant: TenantAccess,
) -> Result<AccessMode, AuthError> {
    match role {
        UserRole::Worker => {
            if !email_verified {
                return Err(AuthError::EmailNotVerified);
            }
            match tenant {
                TenantAccess::Blocked => Err(AuthError::TenantBlocked),
                TenantAccess::Expired => Ok(AccessMode::ReadOnly),
                TenantAccess::Active | TenantAccess::Trial => Ok(AccessMode::Active),
            }
        }
        UserRole::Client => match tenant {
            TenantAccess::Blocked | TenantAccess::Expired => Err(AuthError::TenantInactive),
            TenantAccess::Active | TenantAccess::Trial => Ok(AccessMode::Active),
        },
    }
}

/// Access mode reported by `/auth/me`; never rejects.
pub fn current_access_mode(role: UserRole, tenant: TenantAccess) -> AccessMode {
    if role == UserRole::Worker && tenant == TenantAccess::Expired {
        AccessMode::ReadOnly
    } else {
        AccessMode::Active
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Fresh URL-safe verification token and the hash that gets stored.
pub fn new_verification_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let raw = URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_verification_token(&raw);
    (raw, hash)
}

pub fn hash_verification_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// JWT claims; `sub` is the user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
    pub access_mode: AccessMode,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role: UserRole,
        access_mode: AccessMode,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            tenant_id,
            role,
            access_mode,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, %access_mode, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}
