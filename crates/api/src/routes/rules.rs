//! Route definitions for the `/v1/rules` resource.
//!
//! ```text
//! GET    /             -> list_rules
//! POST   /             -> create_rule
//! PUT    /{id}         -> update_rule
//! PATCH  /{id}/toggle  -> toggle_rule
//! DELETE /{id}         -> delete_rule
//! ```

use axum::routing::{get, patch, put};
use axum::Router;

use crate::handlers::rules;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rules::list_rules).post(rules::create_rule))
        .route("/{id}", put(rules::update_rule).delete(rules::delete_rule))
        .route("/{id}/toggle", patch(rules::toggle_rule))
}
