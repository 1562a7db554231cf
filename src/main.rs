// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};

use crate::application::chart_service::ChartService;
use crate::application::datasource_service::DatasourceService;
use crate::application::introspector::SchemaIntrospector;
use crate::application::schema_cache::SchemaCache;
use crate::application::schema_source::DatabaseConnector;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::mysql_connector::MySqlConnector;
use crate::infrastructure::secret_cipher::SecretCipher;
use crate::infrastructure::sqlite_store::SqliteStore;
use crate::presentation::app_state::AppState;
use crate::presentation::routes::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = load_app_config()?;

    // Initialize tracing
    infrastructure::logging::init(&config.logging)?;

    // Create repository (infrastructure layer)
    let cipher = SecretCipher::from_base64(&config.security.secret_key)
        .context("security.secret_key must be base64 of 32 bytes")?;
    let store = Arc::new(SqliteStore::open(&config.store.path, cipher)?);
    let introspector = SchemaIntrospector::new(vec![Arc::new(MySqlConnector) as Arc<dyn DatabaseConnector>]);
    let cache = SchemaCache::new(store.clone(), introspector.clone());

    // Create services (application layer)
    let datasource_service = DatasourceService::new(store.clone(), introspector.clone(), cache.clone());
    let chart_service = ChartService::new(store.clone(), store, introspector, cache);

    // Create application state
    let state = Arc::new(AppState {
        datasource_service,
        chart_service,
    });

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid server.bind address {}", config.server.bind))?;
    tracing::info!(%addr, store = %config.store.path.display(), "Starting schema-charts service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state)).await?;

    Ok(())
}
