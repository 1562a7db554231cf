// Ports to the external database being charted
use crate::application::errors::IntrospectionError;
use crate::domain::chart::ChartPoint;
use crate::domain::datasource::{ConnectionParams, DatabaseKind};
use crate::domain::schema::TableSchema;
use async_trait::async_trait;

/// Opens connections for one database kind.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    fn kind(&self) -> DatabaseKind;

    /// Open a fresh, unpooled connection.
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn ExternalDatabase>, IntrospectionError>;
}

/// A live, read-only connection to the external database.
#[async_trait]
pub trait ExternalDatabase: Send {
    /// Every table visible to the credential, columns in ordinal order.
    async fn reflect(&mut self) -> anyhow::Result<Vec<TableSchema>>;

    /// Run a grouped aggregation and return one point per group, in result order.
    async fn query_points(&mut self, sql: &str) -> anyhow::Result<Vec<ChartPoint>>;

    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}
