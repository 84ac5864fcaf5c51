//! Route definitions for the `/v1/users` resource.
//!
//! ```text
//! GET    /{user_id}/notification-profile -> notification_profile
//! PATCH  /{user_id}/preferences          -> update_preferences
//! POST   /{user_id}/opt-out/{topic}      -> opt_out_topic
//! DELETE /{user_id}/opt-out/{topic}      -> opt_in_topic
//! POST   /{user_id}/feedback             -> record_feedback
//! ```

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{user_id}/notification-profile",
            get(users::notification_profile),
        )
        .route("/{user_id}/preferences", patch(users::update_preferences))
        .route(
            "/{user_id}/opt-out/{topic}",
            post(users::opt_out_topic).delete(users::opt_in_topic),
        )
        .route("/{user_id}/feedback", post(users::record_feedback))
}
