use std::sync::Arc;

use triage_db::DbPool;
use triage_engine::rules::RulesEngine;
use triage_engine::{EngineConfig, Pipeline};
use triage_kv::KvStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// KV store for counters, cooldowns, and cached profiles.
    pub kv: Arc<dyn KvStore>,
    /// The full evaluation pipeline.
    pub pipeline: Arc<Pipeline>,
    /// Cached rules engine (invalidated by rule CRUD handlers).
    pub rules: Arc<RulesEngine>,
    /// Engine tunables.
    pub engine_config: Arc<EngineConfig>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
