// Introspection cache - memory, then stored blobs, then live introspection
use crate::application::errors::CacheError;
use crate::application::introspector::SchemaIntrospector;
use crate::application::repositories::DatasourceRepository;
use crate::domain::datasource::{Datasource, DatasourceId};
use crate::domain::schema::IntrospectedSchema;
use crate::infrastructure::schema_codec;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One materialized schema per datasource id for the life of the process.
///
/// Entries are dropped only through [`SchemaCache::invalidate`]; credential
/// changes never evict.
#[derive(Clone)]
pub struct SchemaCache {
    repository: Arc<dyn DatasourceRepository>,
    introspector: SchemaIntrospector,
    memory: Arc<RwLock<HashMap<DatasourceId, Arc<IntrospectedSchema>>>>,
    fill_lock: Arc<Mutex<()>>,
}

impl SchemaCache {
    pub fn new(repository: Arc<dyn DatasourceRepository>, introspector: SchemaIntrospector) -> Self {
        Self {
            repository,
            introspector,
            memory: Arc::new(RwLock::new(HashMap::new())),
            fill_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load(&self, datasource: &Datasource) -> Result<Arc<IntrospectedSchema>, CacheError> {
        if let Some(found) = self.cached(datasource.id).await {
            tracing::debug!(datasource = datasource.id, "schema cache hit");
            return Ok(found);
        }

        // Serialize fills so concurrent first reads introspect at most once.
        let _guard = self.fill_lock.lock().await;
        if let Some(found) = self.cached(datasource.id).await {
            return Ok(found);
        }

        let stored = self.repository.load_schema(datasource.id).await?;
        let schema = match schema_codec::decode(&stored) {
            Some(schema) => {
                tracing::debug!(datasource = datasource.id, "schema restored from store");
                schema
            }
            None => {
                if !stored.is_empty() {
                    tracing::warn!(datasource = datasource.id, "stored schema unusable, re-introspecting");
                }
                let schema = self.introspector.introspect(&datasource.params).await?;
                self.store(datasource.id, &schema).await?;
                schema
            }
        };

        let schema = Arc::new(schema);
        self.memory
            .write()
            .await
            .insert(datasource.id, schema.clone());
        Ok(schema)
    }

    /// Persist all three mappings and the timestamp in one write.
    pub async fn store(&self, id: DatasourceId, schema: &IntrospectedSchema) -> Result<(), CacheError> {
        let stored = schema_codec::encode(schema)?;
        self.repository.store_schema(id, &stored, Utc::now()).await?;
        Ok(())
    }

    /// Swap in a freshly introspected schema on every tier. Holds the fill
    /// lock so an in-flight fill cannot put the previous schema back.
    pub async fn replace(
        &self,
        id: DatasourceId,
        schema: IntrospectedSchema,
    ) -> Result<Arc<IntrospectedSchema>, CacheError> {
        let _guard = self.fill_lock.lock().await;
        self.store(id, &schema).await?;
        Ok(self.prime(id, schema).await)
    }

    /// Seed the memory tier after a fresh introspection.
    pub async fn prime(&self, id: DatasourceId, schema: IntrospectedSchema) -> Arc<IntrospectedSchema> {
        let schema = Arc::new(schema);
        self.memory.write().await.insert(id, schema.clone());
        schema
    }

    pub async fn invalidate(&self, id: DatasourceId) {
        if self.memory.write().await.remove(&id).is_some() {
            tracing::info!(datasource = id, "schema cache invalidated");
        }
    }

    async fn cached(&self, id: DatasourceId) -> Option<Arc<IntrospectedSchema>> {
        self.memory.read().await.get(&id).cloned()
    }
}
