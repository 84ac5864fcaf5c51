use triage_core::error::CoreError;

/// Errors surfaced by the evaluation pipeline and its services.
///
/// Soft dependency failures (KV, bus, LLM) never appear here; those
/// degrade in place. What remains is persistence failures and genuinely
/// unexpected conditions.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
