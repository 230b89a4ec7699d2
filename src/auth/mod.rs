use crate::state::AppState;
use axum::Router;

pub mod accounts;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use accounts::{AccountStanding, AccountStore, PgAccountStore};
pub use extractors::{AuthUser, WriteAccess};

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
