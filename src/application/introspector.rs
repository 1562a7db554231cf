// Schema introspector - connect, reflect and classify an external database
use crate::application::errors::IntrospectionError;
use crate::application::schema_source::{DatabaseConnector, ExternalDatabase};
use crate::domain::datasource::ConnectionParams;
use crate::domain::schema::IntrospectedSchema;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct SchemaIntrospector {
    connectors: Vec<Arc<dyn DatabaseConnector>>,
}

impl SchemaIntrospector {
    pub fn new(connectors: Vec<Arc<dyn DatabaseConnector>>) -> Self {
        Self { connectors }
    }

    pub async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn ExternalDatabase>, IntrospectionError> {
        let connector = self
            .connectors
            .iter()
            .find(|c| c.kind() == params.kind)
            .ok_or_else(|| IntrospectionError::UnsupportedDatabaseKind(params.kind.to_string()))?;

        tracing::debug!(url = %params.redacted_url(), "connecting to external database");
        connector.connect(params).await
    }

    /// Check that the parameters reach a database. Nothing is read.
    pub async fn validate(&self, params: &ConnectionParams) -> Result<(), IntrospectionError> {
        let db = self.connect(params).await?;
        if let Err(e) = db.close().await {
            tracing::warn!("Error closing validation connection: {}", e);
        }
        Ok(())
    }

    pub async fn introspect(
        &self,
        params: &ConnectionParams,
    ) -> Result<IntrospectedSchema, IntrospectionError> {
        let started = Instant::now();
        let mut db = self.connect(params).await?;

        let reflected = db.reflect().await;
        if let Err(e) = db.close().await {
            tracing::warn!("Error closing introspection connection: {}", e);
        }
        let tables = reflected.map_err(|e| IntrospectionError::Reflection(format!("{:#}", e)))?;

        let schema = IntrospectedSchema::from_tables(tables);
        tracing::info!(
            url = %params.redacted_url(),
            tables = schema.tables.len(),
            ms = started.elapsed().as_millis() as u64,
            "introspected external database"
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite_fixture::SqliteFixture;

    #[tokio::test]
    async fn test_introspect_classifies_every_table() {
        let fixture = SqliteFixture::orders();
        let introspector = SchemaIntrospector::new(vec![fixture.connector()]);

        let schema = introspector.introspect(&fixture.params()).await.unwrap();

        assert!(schema.is_consistent());
        assert_eq!(schema.table_names(), ["audit_log", "orders", "regions"]);
        assert_eq!(schema.measures_of("orders"), ["id", "amount"]);
        assert_eq!(schema.dimensions_of("orders"), ["region", "customer"]);
        assert!(schema.measures_of("regions").is_empty());
        assert_eq!(schema.dimensions_of("regions"), ["name"]);
        assert!(schema.measures_of("audit_log").is_empty());
        assert!(schema.dimensions_of("audit_log").is_empty());
    }

    #[tokio::test]
    async fn test_ignored_columns_appear_nowhere() {
        let fixture = SqliteFixture::orders();
        let introspector = SchemaIntrospector::new(vec![fixture.connector()]);

        let schema = introspector.introspect(&fixture.params()).await.unwrap();

        for name in ["placed_at", "receipt"] {
            assert!(!schema.measures_of("orders").iter().any(|c| c == name));
            assert!(!schema.dimensions_of("orders").iter().any(|c| c == name));
        }
        assert_eq!(schema.tables["orders"].columns.len(), 6);
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_reported() {
        let fixture = SqliteFixture::orders();
        let introspector = SchemaIntrospector::new(vec![]);

        let err = introspector.validate(&fixture.params()).await.unwrap_err();
        assert!(matches!(err, IntrospectionError::UnsupportedDatabaseKind(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_reported() {
        let fixture = SqliteFixture::orders();
        fixture.refuse_connections(true);
        let introspector = SchemaIntrospector::new(vec![fixture.connector()]);

        let err = introspector.introspect(&fixture.params()).await.unwrap_err();
        assert!(matches!(err, IntrospectionError::Connection(_)));
        assert_eq!(fixture.reflections(), 0);
    }
}
