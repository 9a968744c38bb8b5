use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use sqlx::SqlitePool;

use crate::mail::Mailer;
use crate::settings::Settings;

/// Shared context handed to modules during initialization and route building.
#[derive(Clone)]
pub struct AppCtx {
    pub settings: Arc<Settings>,
    pub db: SqlitePool,
    pub mailer: Arc<dyn Mailer>,
}

/// Migration definition contributed by a module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Core module trait that all Medley modules implement.
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module; also its mount point under `/api/{name}`.
    fn name(&self) -> &'static str;

    /// Initialize the module with the provided context.
    /// Called during application startup after migrations have run.
    async fn init(&self, _ctx: &AppCtx) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the Axum router for this module's routes.
    fn routes(&self, _ctx: &AppCtx) -> Router {
        Router::new()
    }

    /// Return OpenAPI specification fragment for this module as JSON.
    /// Will be merged with other modules' specs.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Return migrations contributed by this module.
    /// Migrations are executed in the order returned.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Start background tasks for this module.
    /// Called after migrations are complete.
    async fn start(&self, _ctx: &AppCtx) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stop the module and clean up resources.
    /// Called during application shutdown.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
