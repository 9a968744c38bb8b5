//! HTTP server facade for Medley with Axum, error handling, and OpenAPI support.

use anyhow::Context;
use axum::{routing::get, Router};

use medley_kernel::{AppCtx, ModuleRegistry};

pub mod error;
pub mod router;

use router::RouterBuilder;

/// Start the HTTP server with the given module registry.
/// Runs until the process receives Ctrl-C.
pub async fn start_server(registry: &ModuleRegistry, ctx: &AppCtx) -> anyhow::Result<()> {
    let settings = &ctx.settings;

    let app = build_router(registry, ctx);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", settings.server.host, settings.server.port))
            .await
            .context("failed to bind to address")?;

    tracing::info!(
        "HTTP server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    Ok(())
}

/// Build the main HTTP router with all module routes mounted.
pub fn build_router(registry: &ModuleRegistry, ctx: &AppCtx) -> Router {
    let mut builder = RouterBuilder::new()
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(ctx.settings.server.request_timeout_ms)
        .route("/healthz", get(health_check));

    for module in registry.modules() {
        tracing::info!(module = module.name(), "mounting module routes");
        builder = builder.mount_module(module.name(), module.routes(ctx));
    }

    builder.with_openapi(registry).build()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install shutdown handler");
    }
}
