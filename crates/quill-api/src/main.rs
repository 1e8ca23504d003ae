//! Quill API Server
//!
//! REST API server for the Quill blogging backend.

use anyhow::Context;
use clap::Parser;
use quill_api::{create_router, state::AppState};
use quill_core::{AppConfig, LoggingConfig, MemoryStore, PgStore, Store};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "quill-api", version, about = "Quill blogging backend API server")]
struct Args {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep users and posts in memory instead of PostgreSQL
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;

    init_tracing(&config.logging);

    let store: Arc<dyn Store> = if args.memory {
        tracing::warn!("using in-memory store, data is lost on shutdown");
        Arc::new(MemoryStore::new())
    } else {
        let store = PgStore::connect(&config.database.postgres_url, config.database.pool_size)
            .await
            .context("Failed to connect to PostgreSQL")?;
        store
            .init_schema()
            .await
            .context("Failed to initialize database schema")?;
        Arc::new(store)
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config, store));

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Quill API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "quill_api={level},quill_core={level},tower_http=debug,audit=info",
            level = logging.level
        )
        .into()
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
