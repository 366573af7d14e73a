use std::sync::Arc;

use anyhow::Context;

use bizdesk_api::Config;
use bizdesk_api::housekeeping::{SESSION_PURGE_PERIOD, spawn_session_purge};
use bizdesk_infra::{InMemoryStore, PostgresStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bizdesk_observability::init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await.context("failed to connect to postgres")?;
            store.migrate().await.context("failed to run migrations")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let _purge = spawn_session_purge(store.clone(), SESSION_PURGE_PERIOD);

    let app = bizdesk_api::app::build_app(config.clone(), store);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
