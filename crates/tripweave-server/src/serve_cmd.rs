use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};

use tripweave_core::generation::ItineraryGenerator;
use tripweave_core::orchestrator::{OrchestratorConfig, PlanOrchestrator};
use tripweave_core::reasoner::{HttpReasoner, PlanReasoner};
use tripweave_core::store::{ItineraryStore, MemoryItineraryStore, PgItineraryStore};
use tripweave_core::trips::TripService;
use tripweave_db::pool;

use crate::api::{AppState, build_router};
use crate::config::{ServerSettings, TripweaveConfig};

/// Wire the store and reasoner into the services the API needs.
pub fn build_state(
    store: Arc<dyn ItineraryStore>,
    reasoner: Arc<dyn PlanReasoner>,
    config: OrchestratorConfig,
) -> AppState {
    let generator = ItineraryGenerator::new(
        Arc::clone(&store),
        Arc::clone(&reasoner),
        config.reasoner_timeout,
    );
    AppState {
        orchestrator: PlanOrchestrator::new(Arc::clone(&store), reasoner).with_config(config),
        trips: TripService::new(store, generator),
    }
}

pub async fn run_serve(
    config: &TripweaveConfig,
    server: &ServerSettings,
    memory_store: bool,
) -> Result<()> {
    let reasoner: Arc<dyn PlanReasoner> = Arc::new(
        HttpReasoner::new(config.reasoner.clone()).context("failed to build reasoner client")?,
    );
    if config.reasoner.api_key.is_none() {
        tracing::warn!("no reasoner API key configured; requests will be sent unauthenticated");
    }

    let db_pool = if memory_store {
        None
    } else {
        let db_pool = pool::create_pool(&config.db_config).await?;
        pool::run_migrations(&db_pool).await?;
        Some(db_pool)
    };
    let store: Arc<dyn ItineraryStore> = match &db_pool {
        Some(p) => Arc::new(PgItineraryStore::new(p.clone())),
        None => {
            tracing::warn!("using in-memory itinerary store; trips are lost on exit");
            Arc::new(MemoryItineraryStore::new())
        }
    };

    let state = build_state(
        store,
        reasoner,
        OrchestratorConfig {
            reasoner_timeout: config.reasoner.timeout,
        },
    );
    let generator = state.trips.generator().clone();
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", server.bind, server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", server.bind, server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(model = %config.reasoner.model, "tripweave serve listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(in_flight = generator.in_flight(), "stopping itinerary generation");
    generator.shutdown().await;
    if let Some(p) = db_pool {
        p.close().await;
    }
    tracing::info!("tripweave serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}
