//! Process wiring: config, storage pool, broker subscription, HTTP server,
//! and the ingestion loop.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use stockwatch_auth::{Credentials, StaticCredentialValidator};
use stockwatch_infra::{
    broker::{AmqpConnector, Topology},
    config::{Config, redact_url},
    event_log::PostgresEventLog,
    ingest::Ingestor,
    retry::RetryPolicy,
};

use crate::app::build_app;

/// Run until the ingestion loop or the HTTP server stops.
///
/// Neither is expected to stop on its own, so either one ending is an error.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    stockwatch_observability::init();

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        broker = %redact_url(&config.broker.url),
        storage = %redact_url(&config.storage.url),
        bind_addr = %config.api.bind_addr,
        on_decode_error = ?config.ingest.on_decode_error,
        "starting stockwatch"
    );

    let levels = config.initial_stock_levels()?;
    info!(seeded_products = levels.len(), "stock levels initialised");

    let pool = PgPoolOptions::new()
        .max_connections(config.storage.max_connections)
        .connect_lazy(&config.storage.url)
        .context("invalid POSTGRES_URL")?;
    let event_log = Arc::new(PostgresEventLog::new(pool));

    let connector = AmqpConnector::new(RetryPolicy::broker_connect(config.broker.connect_attempts));
    let source = connector
        .connect(&config.broker.url)
        .await?
        .subscribe(&Topology::default())
        .await?;

    let validator = Arc::new(StaticCredentialValidator::new(Credentials::new(
        config.api.username.clone(),
        config.api.password.clone(),
    )));
    let app = build_app(event_log.clone(), validator);

    let listener = tokio::net::TcpListener::bind(config.api.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.api.bind_addr))?;
    info!(addr = %listener.local_addr()?, "query api listening");

    let mut server = tokio::spawn(async move { axum::serve(listener, app).await });
    let server_handle = server.abort_handle();

    let ingestor = Ingestor::new(levels, event_log, config.ingest_policy());

    tokio::select! {
        result = ingestor.run(source) => {
            server_handle.abort();
            let stats = result?;
            error!(?stats, "inventory update stream closed");
            anyhow::bail!("inventory update stream closed after {} deliveries", stats.received)
        }
        joined = &mut server => {
            match joined {
                Ok(Ok(())) => anyhow::bail!("query api server stopped"),
                Ok(Err(e)) => Err(e).context("query api server failed"),
                Err(e) => Err(e).context("query api task failed"),
            }
        }
    }
}
