use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::services::{is_valid_email, AccessMode, UserRole, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN};
use crate::error::FieldErrors;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Lower-cased email when both fields pass.
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = self.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            errors.push("email", "invalid_email");
        }
        let len = self.password.chars().count();
        if len < PASSWORD_MIN_LEN {
            errors.push("password", "too_short");
        } else if len > PASSWORD_MAX_LEN {
            errors.push("password", "too_long");
        }
        errors.into_result(email)
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterOut {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_verify_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailIn {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginOut {
    pub access_token: String,
    pub token_type: &'static str,
    pub access_mode: AccessMode,
    pub user: PublicUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MeOut {
    #[serde(flatten)]
    pub user: PublicUser,
    pub access_mode: AccessMode,
}
