//! Health check handler with per-dependency probes.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use triage_kv::KvStore;

use crate::state::AppState;

/// GET /health
///
/// 200 when every dependency answers, 503 otherwise. The body lists each
/// dependency's status either way.
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let postgres = match triage_db::health_check(&state.pool).await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };

    let kv = match state
        .kv
        .set("health:probe", "1", Duration::from_secs(5))
        .await
    {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };

    let all_ok = postgres == "ok" && kv == "ok";
    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if all_ok { "healthy" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "services": {
                "postgres": postgres,
                "kv": kv,
            },
        })),
    )
}
