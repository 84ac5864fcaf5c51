//! Route definitions, grouped by resource and mounted under `/v1`.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod notifications;
pub mod rules;
pub mod users;

/// All `/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/notifications", notifications::router())
        .nest("/rules", rules::router())
        .nest("/users", users::router())
}
