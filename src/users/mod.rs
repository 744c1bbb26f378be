use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handlers;

pub use dto::MessageResponse;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::user_routes())
        .merge(handlers::me_routes())
}
