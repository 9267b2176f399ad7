use anyhow::Context;
use clap::{Parser, Subcommand};

use bookshelf_app::Bookshelf;
use bookshelf_db::Database;
use bookshelf_kernel::settings::Settings;

/// Operator entrypoint for the bookshelf service
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ensure the schema exists and serve HTTP until interrupted
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ensure the schema exists, then exit
    Migrate,
    /// Load settings and check that the store answers
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            Bookshelf::connect(settings).await?.serve().await
        }
        Command::Migrate => {
            let applied = bookshelf_app::migrate(&settings).await?;
            tracing::info!(applied, "schema is up to date");
            Ok(())
        }
        Command::Check => {
            let database = Database::connect(&settings.database)
                .await
                .context("failed to connect to the book store")?;
            database.ping().await.context("book store did not answer")?;
            database.close().await;
            tracing::info!(env = ?settings.environment, "book store reachable");
            Ok(())
        }
    }
}
