//! Delivery Tracker service
//!
//! Serves delivery lookups and waits over HTTP, backed by a relayer
//! status service.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use delivery_tracker::api::{self, AppState};
use delivery_tracker::chain::ChainRegistry;
use delivery_tracker::config::Settings;
use delivery_tracker::metrics::MetricsServer;
use delivery_tracker::status::{HttpStatusProvider, StatusProvider};
use delivery_tracker::tracker::DeliveryTracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Delivery Tracker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    let registry = Arc::new(ChainRegistry::from_configs(settings.chains.values()));
    info!("Registered {} chains", registry.len());

    let provider: Arc<dyn StatusProvider> =
        Arc::new(HttpStatusProvider::new(&settings.status, registry.clone())?);
    info!(
        "Status service configured with {} endpoint(s)",
        settings.status.urls.len()
    );

    let wait_options = settings.wait_options();
    info!("Default wait policy: {:?}", wait_options);

    let state = AppState {
        tracker: DeliveryTracker::new(provider.clone()),
        provider,
        registry,
        wait_options,
    };

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Delivery Tracker is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // In-flight waits are dropped with their tasks
    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Delivery Tracker stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,delivery_tracker=debug,hyper=warn,reqwest=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
