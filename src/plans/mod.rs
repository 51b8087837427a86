mod dto;
pub mod handlers;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::plan_routes())
        .merge(handlers::saved_routes())
}
