//! studybank-api - backend for administering cognitive-assessment studies
//!
//! Researchers generate batches of study access codes and export collected
//! test results; participants submit results against a study code.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use studybank_api::{build_router, db, AppState};
use studybank_common::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting studybank-api v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::from_env()?;
    info!("Database path: {}", settings.db_path.display());

    let pool = match db::init_database(&settings.db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let bind_addr = settings.bind_addr;
    let state = AppState::new(pool.clone(), Arc::new(settings));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("studybank-api listening on http://{}", bind_addr);
    info!("Researcher form: http://{}/admin", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The pool is a process-lifetime resource; close it before exit so WAL
    // checkpointing finishes cleanly.
    pool.close().await;
    info!("Database pool closed, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
