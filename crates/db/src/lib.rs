//! SQLite connection pool factory, migration runner and store ping.
//!
//! The pool is the only handle to persisted state; callers clone
//! [`Database`] freely since the pool is reference counted.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::{Migration, ReadinessProbe};

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

/// Handle to the relational store backing every module.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool against `settings.url`, creating the database file if needed.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)?.create_if_missing(true);

        // Every connection to `:memory:` is a distinct database, so pin the
        // pool to one connection that is never recycled.
        let pool = if is_in_memory(&settings.url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(settings.max_connections.max(1))
                .connect_with(options)
                .await?
        };

        tracing::info!(
            target: "bookshelf-db",
            url = %settings.url,
            "database pool ready"
        );

        Ok(Self { pool })
    }

    /// Create in-memory database (for testing)
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Issue a trivial query to confirm the store answers.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Apply every migration not yet recorded in `schema_migrations`.
    ///
    /// Safe to call on every boot; returns how many migrations ran.
    pub async fn run_migrations(&self, migrations: &[(String, Migration)]) -> Result<usize> {
        sqlx::query(MIGRATIONS_TABLE).execute(&self.pool).await?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let already_applied: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM schema_migrations WHERE module = ? AND id = ?")
                    .bind(module.as_str())
                    .bind(migration.id)
                    .fetch_optional(&self.pool)
                    .await?;

            if already_applied.is_some() {
                tracing::debug!(
                    target: "bookshelf-db",
                    module = %module,
                    migration = migration.id,
                    "migration already applied"
                );
                continue;
            }

            self.apply(module, migration)
                .await
                .map_err(|source| DbError::Migration {
                    module: module.clone(),
                    id: migration.id,
                    source,
                })?;

            tracing::info!(
                target: "bookshelf-db",
                module = %module,
                migration = migration.id,
                "migration applied"
            );
            applied += 1;
        }

        Ok(applied)
    }

    async fn apply(&self, module: &str, migration: &Migration) -> sqlx::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::raw_sql(migration.up).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO schema_migrations (module, id) VALUES (?, ?)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    /// Close the pool; later queries fail with a pool-closed error.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(target: "bookshelf-db", "database pool closed");
    }
}

#[async_trait]
impl ReadinessProbe for Database {
    async fn ready(&self) -> anyhow::Result<()> {
        self.ping().await?;
        Ok(())
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
