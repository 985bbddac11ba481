//! TwinShield Server
//!
//! HTTP front for the digital-twin threat pipeline.
//!
//! # Architecture
//!
//! ```text
//! telemetry ──► FeatureNormalizer ──► TwinStore ◄── SimulationCoordinator
//!                                         │            │ score, tier, actions
//!                                         ▼            ▼
//!                                    DeviceView    ActionSink ──► consumer task
//!                                         │            │
//!                                         └──► DashboardState (reduce)
//! ```

mod config;
mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use rand::SeedableRng;
use tokio::sync::mpsc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use twinshield_core::logic::fleet::mock_fleet;
use twinshield_core::logic::ingest::TelemetryInput;
use twinshield_core::logic::response::{ChannelSink, DefenseAction};
use twinshield_core::logic::twin::InMemoryTwinStore;
use twinshield_core::logic::PipelineConfig;

pub use error::{AppError, AppResult};
pub use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "twinshield_server=debug,twinshield_core=info,tower_http=debug".into());
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let pipeline = PipelineConfig::from_env();
    tracing::info!("TwinShield Server starting ({})", config.environment);
    tracing::info!(
        "Pipeline: {} workers, store timeout {:?}, run timeout {:?}",
        pipeline.max_workers,
        pipeline.store_timeout,
        pipeline.run_timeout
    );

    let (sink, actions) = ChannelSink::new(config.action_channel_capacity);
    tokio::spawn(consume_actions(actions));

    let state = AppState::new(
        config.clone(),
        pipeline,
        Arc::new(InMemoryTwinStore::new()),
        Arc::new(sink),
    );
    tracing::info!("Scorer: {}", state.coordinator.scorer_name());

    if config.seed_demo_fleet {
        let mut rng = rand::rngs::StdRng::from_entropy();
        let batch = mock_fleet(&mut rng).into_iter().map(TelemetryInput::from).collect();
        let report = state.ingestor.ingest(batch).await;
        tracing::info!("Seeded {} demo device(s)", report.devices.len());
        state.refresh_devices().await;
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("serving HTTP")?;

    Ok(())
}

/// Drain the defense action channel.
async fn consume_actions(mut actions: mpsc::Receiver<DefenseAction>) {
    while let Some(action) = actions.recv().await {
        tracing::info!(
            device_id = %action.device_id,
            tier = %action.tier,
            "[ACTION] {}",
            action.text
        );
    }
    tracing::debug!("Defense action channel closed");
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/telemetry", post(handlers::telemetry::ingest))
        .route("/api/v1/devices", get(handlers::devices::list))
        .route("/api/v1/devices/:id", get(handlers::devices::get))
        .route("/api/v1/simulation/run", post(handlers::simulation::run))
        .route("/api/v1/simulation/cancel", post(handlers::simulation::cancel))
        .route("/api/v1/simulation/latest", get(handlers::simulation::latest))
        .route("/api/v1/simulation/history", get(handlers::simulation::history))
        .route("/api/v1/simulation/runs/:id", get(handlers::simulation::get))
        .route("/api/v1/defense/apply", post(handlers::defense::apply))
        .route("/api/v1/dashboard", get(handlers::dashboard::get))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
