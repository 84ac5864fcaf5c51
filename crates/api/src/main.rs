use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triage_api::config::ServerConfig;
use triage_api::router::build_app_router;
use triage_api::seed::seed_default_rules;
use triage_api::state::AppState;
use triage_bus::{BroadcastBus, MessageBus};
use triage_engine::rules::RulesEngine;
use triage_engine::{DigestScheduler, EngineConfig, Pipeline};
use triage_kv::{KvStore, MemoryKv};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "triage_api=debug,triage_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine_config = Arc::new(EngineConfig::from_env());
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = triage_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    triage_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    triage_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- KV store and message bus ---
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let bus: Arc<dyn MessageBus> = Arc::new(BroadcastBus::default());
    tracing::info!(
        redis_url = %engine_config.redis_url,
        kafka = %engine_config.kafka_bootstrap_servers,
        "KV store and bus ready (in-process adapters)"
    );

    // --- Rules ---
    seed_default_rules(&pool)
        .await
        .expect("Failed to seed default rules");
    let rules = Arc::new(RulesEngine::new());

    // --- Pipeline ---
    let pipeline = Arc::new(Pipeline::new(
        kv.clone(),
        bus.clone(),
        Arc::clone(&rules),
        Arc::clone(&engine_config),
    ));

    // --- Digest scheduler ---
    let scheduler_cancel = CancellationToken::new();
    let scheduler = DigestScheduler::new(pool.clone(), bus.clone(), Arc::clone(&engine_config));
    let scheduler_token = scheduler_cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_token).await;
    });
    tracing::info!("Digest scheduler started");

    // --- App state & router ---
    let state = AppState {
        pool,
        kv,
        pipeline,
        rules,
        engine_config,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST"),
        config.port,
    );
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Stop background services and wait for them to drain.
    scheduler_cancel.cancel();
    let _ = scheduler_handle.await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
        // Without a working signal handler, never trigger shutdown.
        std::future::pending::<()>().await;
    }
}
