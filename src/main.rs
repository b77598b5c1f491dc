use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod engine;
mod error;
mod explainer;
mod extractors;
mod features;
mod fetcher;
mod model_manager;
mod models;
mod routes;
mod scoring;
mod storage;
mod types;

use config::Config;
use engine::PhishingEngine;
use model_manager::ModelManager;
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phishsense=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);

    // Models degrade to placeholders rather than blocking startup
    let mut models = ModelManager::new(config.models.clone());
    if let Err(e) = models.load_models() {
        warn!("Serving with placeholder models: {}", e);
    }

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let engine = PhishingEngine::new(&config, models)?;
    let state = AppState {
        engine: Arc::new(engine),
        prometheus,
    };

    let app = routes::router(state, routes::cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    if config.is_production() && config.cors_origins.iter().any(|o| o == "*") {
        warn!("CORS allows every origin in production");
    }

    let addr = config.socket_addr()?;
    info!("Starting PhishSense API on {} ({})", addr, config.environment);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Shutdown signal received, starting graceful shutdown");
}
