//! Bookshelf application library
//!
//! Wires the books module, the SQLite store and the HTTP layer together and
//! drives the module lifecycle around the server.

pub mod modules;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use bookshelf_db::Database;
use bookshelf_http::{HttpMetrics, SharedProbe};
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// A fully initialized service: modules registered and schema ensured.
pub struct Bookshelf {
    settings: Settings,
    database: Database,
    registry: ModuleRegistry,
    metrics: HttpMetrics,
}

impl Bookshelf {
    /// Connect to the configured store and initialize every module.
    pub async fn connect(settings: Settings) -> anyhow::Result<Self> {
        let database = Database::connect(&settings.database)
            .await
            .context("failed to connect to the book store")?;
        Self::with_database(settings, database).await
    }

    /// Initialize modules against an existing database handle.
    pub async fn with_database(settings: Settings, database: Database) -> anyhow::Result<Self> {
        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &database);

        let ctx = InitCtx {
            settings: &settings,
        };
        registry.init_modules(&ctx).await?;

        let applied = database
            .run_migrations(&registry.collect_migrations())
            .await
            .context("failed to ensure schema")?;
        tracing::info!(applied, "schema ready");

        let metrics = HttpMetrics::new().context("failed to register HTTP metrics")?;

        Ok(Self {
            settings,
            database,
            registry,
            metrics,
        })
    }

    /// The complete HTTP router, including probes and middleware.
    pub fn router(&self) -> anyhow::Result<Router> {
        bookshelf_http::build_router(
            &self.registry,
            &self.settings,
            self.probe(),
            self.metrics.clone(),
        )
    }

    pub fn metrics(&self) -> &HttpMetrics {
        &self.metrics
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Start modules, serve until shutdown, then stop modules and close the pool.
    pub async fn serve(self) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
        };
        if let Err(e) = self.registry.start_modules(&ctx).await {
            self.database.close().await;
            return Err(e);
        }

        let served = bookshelf_http::start_server(
            &self.registry,
            &self.settings,
            self.probe(),
            self.metrics.clone(),
        )
        .await;

        self.registry.stop_modules().await?;
        self.database.close().await;

        served
    }

    fn probe(&self) -> SharedProbe {
        Arc::new(self.database.clone())
    }
}

/// Ensure the schema exists without serving traffic. Returns how many
/// migrations ran.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let database = Database::connect(&settings.database)
        .await
        .context("failed to connect to the book store")?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &database);

    let applied = database
        .run_migrations(&registry.collect_migrations())
        .await
        .context("failed to ensure schema")?;
    database.close().await;

    Ok(applied)
}
