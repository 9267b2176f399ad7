//! HTTP server facade for the bookshelf service: routing, error mapping,
//! health probes and request metrics on top of Axum.

use anyhow::Context;
use axum::Router;

use bookshelf_kernel::{settings::Settings, ModuleRegistry};

pub mod error;
pub mod health;
pub mod metrics;
pub mod router;

pub use error::AppError;
pub use health::SharedProbe;
pub use metrics::HttpMetrics;

use router::RouterBuilder;

/// Start the HTTP server and block until a shutdown signal arrives
pub async fn start_server(
    registry: &ModuleRegistry,
    settings: &Settings,
    probe: SharedProbe,
    metrics: HttpMetrics,
) -> anyhow::Result<()> {
    let address = settings.server.bind_address();
    tracing::info!("starting HTTP server on {}", address);

    // Build the main router
    let app = build_router(registry, settings, probe, metrics)
        .context("failed to build HTTP router")?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {}", address))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with probes, metrics and all module routes mounted
pub fn build_router(
    registry: &ModuleRegistry,
    settings: &Settings,
    probe: SharedProbe,
    metrics: HttpMetrics,
) -> anyhow::Result<Router> {
    let mut router_builder = RouterBuilder::new()
        .with_health(probe)
        .with_metrics_endpoint(metrics.clone());

    for module in registry.modules() {
        router_builder = router_builder.mount_module(module.name(), module.routes());
    }

    // Outermost last: request ids wrap tracing, which wraps metrics and CORS.
    let router = router_builder
        .with_openapi(registry)
        .with_cors(&settings.cors)?
        .with_request_metrics(metrics)
        .with_tracing()
        .with_request_id()
        .build();

    Ok(router)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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

    tracing::info!("shutdown signal received");
}
