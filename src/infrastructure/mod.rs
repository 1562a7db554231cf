// Infrastructure layer - External dependencies and adapters
pub mod chart_options;
pub mod config;
pub mod logging;
pub mod mysql_connector;
pub mod schema_codec;
pub mod secret_cipher;
#[cfg(test)]
pub mod sqlite_fixture;
pub mod sqlite_store;
