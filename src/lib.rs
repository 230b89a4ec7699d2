pub mod app;
pub mod auth;
pub mod client;
pub mod common;
pub mod config;
pub mod dates;
pub mod error;
pub mod extract;
pub mod food;
pub mod mailer;
pub mod nutrition;
pub mod planning;
pub mod query;
pub mod state;
pub mod worker;
