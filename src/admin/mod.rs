mod dto;
pub mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

/// Every route here requires an admin session.
pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::admin_routes())
}
