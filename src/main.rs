//! Farm Market - farmer-to-consumer produce marketplace

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farm_market::config::AppConfig;
use farm_market::http::{self, AppState};
use farm_market::publisher::{EventPublisher, NatsPublisher, NullPublisher};
use farm_market::seed;
use farm_market::services::Services;
use farm_market::store::{PgStore, Stores};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let stores = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(config.db_max_connections).connect(url).await?;
            let store = PgStore::new(pool);
            store.migrate().await?;
            tracing::info!("using postgres store");
            Stores::postgres(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, state lives in memory and is lost on exit");
            Stores::memory()
        }
    };

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, config.event_subject_prefix.clone())),
            Err(err) => {
                tracing::warn!(error = %err, "could not reach NATS, domain events will be dropped");
                Arc::new(NullPublisher)
            }
        },
        None => Arc::new(NullPublisher),
    };

    let services = Services::new(stores, publisher, config.auto_approve_products);
    if config.seed_demo_accounts {
        if config.database_url.is_some() {
            tracing::warn!("SEED_DEMO_ACCOUNTS only applies to the in-memory store, skipping");
        } else {
            seed::demo_market(&services).await?;
        }
    }

    let app = http::router(AppState::new(services));
    let addr = config.bind_address();
    tracing::info!("🚀 Farm Market listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
