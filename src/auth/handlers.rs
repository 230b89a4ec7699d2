use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{LoginOut, LoginRequest, MeOut, PublicUser, RegisterOut, RegisterRequest, VerifyEmailIn},
    extractors::AuthUser,
    repo,
    repo_types::UserRow,
    services::{
        current_access_mode, hash_password, hash_verification_token, login_access_mode,
        new_verification_token, tenant_access_mode, verify_password, AuthError, JwtKeys,
        UserRole, TRIAL_DAYS, VERIFICATION_TOKEN_TTL_HOURS,
    },
};
use crate::{
    common::StatusOut,
    error::{AppError, AppResult},
    extract::{Json, Query},
    mailer::verification_url,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-email", post(verify_email).get(verify_email_link))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<RegisterOut>> {
    let email = payload.validate()?;

    if repo::worker_email_taken(&state.db, &email).await? {
        warn!(email = %email, "email already registered");
        return Err(AuthError::EmailInUse.into());
    }

    let password_hash = hash_password(&payload.password)?;
    let (raw_token, token_hash) = new_verification_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS);

    let user_id = repo::register_worker(&state.db, &email, &password_hash, &token_hash, expires_at)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::from(AuthError::EmailInUse)
            } else {
                AppError::from(e)
            }
        })?;

    let url = verification_url(&state.config.public_api_base_url, &raw_token);
    if let Err(e) = state.mailer.send_verification(&email, &url).await {
        error!(error = %e, user_id = %user_id, "sending verification email failed");
    }

    info!(user_id = %user_id, email = %email, "worker registered");
    Ok(Json(RegisterOut {
        status: "ok",
        dev_verify_token: state.config.is_development().then_some(raw_token),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailIn>,
) -> AppResult<Json<StatusOut>> {
    consume_token(&state, &payload.token).await
}

#[instrument(skip(state, params))]
pub async fn verify_email_link(
    State(state): State<AppState>,
    Query(params): Query<VerifyEmailIn>,
) -> AppResult<Json<StatusOut>> {
    consume_token(&state, &params.token).await
}

async fn consume_token(state: &AppState, raw: &str) -> AppResult<Json<StatusOut>> {
    let token_hash = hash_verification_token(raw.trim());
    let Some(token) = repo::find_unconsumed_token(&state.db, &token_hash).await? else {
        warn!("unknown or consumed verification token");
        return Err(AuthError::InvalidToken.into());
    };

    let now = OffsetDateTime::now_utc();
    if now > token.expires_at {
        warn!(user_id = %token.user_id, "verification token expired");
        return Err(AuthError::TokenExpired.into());
    }

    repo::consume_verification(&state.db, &token, now, now + Duration::days(TRIAL_DAYS)).await?;
    info!(user_id = %token.user_id, "email verified");
    Ok(Json(StatusOut::ok()))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginOut>> {
    let email = payload.email.trim().to_lowercase();

    let Some(user) = repo::find_user_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AuthError::InvalidCredentials.into());
    };
    if !user.is_active {
        warn!(user_id = %user.id, "login for inactive user");
        return Err(AuthError::UserInactive.into());
    }
    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let role = parse_role(&user)?;
    let tenant = repo::get_tenant(&state.db, user.tenant_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {} has no tenant", user.id))?;
    let tenant_access = tenant_access_mode(&tenant, OffsetDateTime::now_utc());

    let access_mode = login_access_mode(role, user.email_verified_at.is_some(), tenant_access)
        .map_err(|e| {
            warn!(user_id = %user.id, reason = %e, "login refused");
            AppError::from(e)
        })?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(user.id, user.tenant_id, role, access_mode)?;

    info!(user_id = %user.id, %access_mode, "user logged in");
    Ok(Json(LoginOut {
        access_token,
        token_type: "bearer",
        access_mode,
        user: public_user(&user, role),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MeOut>> {
    let user = repo::find_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("user_not_found"))?;
    let tenant = repo::get_tenant(&state.db, user.tenant_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("user_not_found"))?;
    let role = parse_role(&user)?;

    let tenant_access = tenant_access_mode(&tenant, OffsetDateTime::now_utc());
    Ok(Json(MeOut {
        user: public_user(&user, role),
        access_mode: current_access_mode(role, tenant_access),
    }))
}

fn parse_role(user: &UserRow) -> AppResult<UserRole> {
    UserRole::parse(&user.role)
        .ok_or_else(|| anyhow::anyhow!("user {} has unknown role {:?}", user.id, user.role).into())
}

fn public_user(user: &UserRow, role: UserRole) -> PublicUser {
    PublicUser {
        id: user.id,
        tenant_id: user.tenant_id,
        role,
        email: user.email.clone(),
    }
}
