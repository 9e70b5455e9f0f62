//! Plaza server entry point.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use plaza_common::{Config, IdGenerator, LocalStorage};
use plaza_core::Processor;
use plaza_db::SeaOrmDatabase;
use plaza_federation::HttpFederator;
use plaza_queue::WorkerPool;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::routes::AppState;

/// Waits for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plaza=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting plaza server...");

    let config = Config::load().context("loading configuration")?;

    let conn = plaza_db::init(&config).await?;
    info!("Connected to database");
    plaza_db::ensure_schema(&conn).await?;
    let db = Arc::new(SeaOrmDatabase::new(Arc::new(conn)));

    let processing = &config.processing;
    let client_pool = Arc::new(WorkerPool::new(
        "client",
        processing.client_workers,
        processing.client_queue_size,
    ));
    let fed_pool = Arc::new(WorkerPool::new(
        "federator",
        processing.federator_workers,
        processing.federator_queue_size,
    ));

    let federator = Arc::new(HttpFederator::new(
        &config,
        db.clone(),
        Arc::new(IdGenerator::new()),
        fed_pool.clone(),
    )?);
    let storage = Arc::new(LocalStorage::from_config(&config.media));

    let processor = Arc::new(Processor::new(
        &config,
        db,
        federator,
        storage,
        client_pool,
        fed_pool,
    ));
    processor.start()?;

    let app = routes::app(AppState {
        processor: processor.clone(),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing listen address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    processor.stop().await?;
    info!("Server shutdown complete");
    Ok(())
}
