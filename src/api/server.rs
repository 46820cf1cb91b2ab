use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    services::{health, subscription},
    state::AppState,
};
use crate::config::Config;
use crate::delivery::{HttpConverter, SubscriptionService};
use crate::fetch::{HttpConfig, HttpFetcher, Orchestrator};
use crate::observability::Metrics;
use crate::store::FjallStore;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// `/health` plus the subscription fallback for every other path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(subscription)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Wire the store, fetcher and converter from `config` into a service.
pub fn build_service(
    config: &Config,
    metrics: Arc<Metrics>,
) -> Result<SubscriptionService, AnyError> {
    let store = FjallStore::open(&config.server.store_path)
        .map_err(|e| format!("Failed to open Fjall store: {}", e))?;

    let fetcher = HttpFetcher::new(HttpConfig::from(&config.fetch))?;
    let orchestrator =
        Orchestrator::new(Arc::new(fetcher), config.fetch.body_timeout(), metrics.clone());
    let converter = HttpConverter::new(&config.converter.user_agent, config.converter.timeout())?;

    let service = SubscriptionService::new(
        store,
        orchestrator,
        Arc::new(converter),
        config.subscription.clone(),
        config.callback_secret(),
        metrics,
    )
    .with_fallback_user_agent(&config.fetch.probe_user_agent);

    Ok(service)
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let metrics = Arc::new(Metrics::new());
    let service = build_service(&config, metrics.clone())?;

    let address = config.server.bind_addr;
    let app = router(AppState::new(config, service, metrics));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "SubHub listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
