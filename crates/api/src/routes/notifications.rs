//! Route definitions for the `/v1/notifications` resource.
//!
//! ```text
//! POST   /evaluate              -> evaluate
//! POST   /batch-evaluate        -> evaluate_batch
//! GET    /audit/{event_id}      -> get_audit
//! GET    /history/{user_id}     -> get_history
//! GET    /ai-logs               -> get_ai_logs
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::notifications;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/evaluate", post(notifications::evaluate))
        .route("/batch-evaluate", post(notifications::evaluate_batch))
        .route("/audit/{event_id}", get(notifications::get_audit))
        .route("/history/{user_id}", get(notifications::get_history))
        .route("/ai-logs", get(notifications::get_ai_logs))
}
