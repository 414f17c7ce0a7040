use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub mod guard;
pub mod handlers;
pub mod jwt;
pub mod memory;
mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod verification;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
