// Repository traits for datasource and chart records
use crate::domain::chart::{Chart, ChartId, NewChart};
use crate::domain::datasource::{Datasource, DatasourceId, NewDatasource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Opaque, text-safe encodings of an introspected schema as they sit in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSchema {
    pub tables: Option<String>,
    pub measures: Option<String>,
    pub dimensions: Option<String>,
}

impl StoredSchema {
    pub fn is_empty(&self) -> bool {
        self.tables.is_none() && self.measures.is_none() && self.dimensions.is_none()
    }
}

#[async_trait]
pub trait DatasourceRepository: Send + Sync {
    /// Insert the record and its schema blobs in one write.
    async fn insert(
        &self,
        datasource: &NewDatasource,
        schema: &StoredSchema,
        introspected_at: DateTime<Utc>,
    ) -> anyhow::Result<Datasource>;

    async fn get(&self, owner: &str, id: DatasourceId) -> anyhow::Result<Option<Datasource>>;

    async fn list(&self, owner: &str) -> anyhow::Result<Vec<Datasource>>;

    /// Persist name and connection fields. Schema blobs are left alone.
    async fn update(&self, datasource: &Datasource) -> anyhow::Result<()>;

    /// Delete the record and its charts. Returns the number of charts removed,
    /// or `None` when the owner has no such datasource.
    async fn delete(&self, owner: &str, id: DatasourceId) -> anyhow::Result<Option<usize>>;

    async fn load_schema(&self, id: DatasourceId) -> anyhow::Result<StoredSchema>;

    /// Replace all three schema blobs and the introspection timestamp together.
    async fn store_schema(
        &self,
        id: DatasourceId,
        schema: &StoredSchema,
        introspected_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ChartRepository: Send + Sync {
    async fn insert(&self, chart: &NewChart) -> anyhow::Result<Chart>;

    async fn get(&self, owner: &str, id: ChartId) -> anyhow::Result<Option<Chart>>;

    async fn list(&self, owner: &str) -> anyhow::Result<Vec<Chart>>;

    /// Persist table and axis selection.
    async fn update(&self, chart: &Chart) -> anyhow::Result<()>;

    async fn delete(&self, owner: &str, id: ChartId) -> anyhow::Result<bool>;
}
